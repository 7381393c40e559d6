use anyhow::Result;

#[derive(Debug, thiserror::Error)]
#[error("Template error on line '{line}': {msg}")]
pub struct Error {
    msg: String,
    pos: usize,
    line: String,
}

/// One parsed chunk of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    /// Text copied verbatim into the rendered output.
    Text(&'a str),
    /// `{name}` placeholder, substituted at render time.
    Var(&'a str),
}

/// Parse template text into pieces.
/// `{ident}` is a placeholder, `{{` and `}}` are literal braces.
pub fn parse(text: &str) -> Result<Vec<Piece<'_>>> {
    use combine::EasyParser;
    grammar::template()
        .easy_parse(text)
        .map(|(pieces, _remainder)| pieces)
        .map_err(|e| {
            let pos = e.position.translate_position(text);
            // isolate the line in question:
            let before = &text[0..pos];
            let after = &text[pos..text.len()];
            let prefix: String = before.chars().rev().take_while(|&c| c != '\n').collect();
            let prefix: String = prefix.chars().rev().collect();
            let suffix: String = after.chars().take_while(|&c| c != '\n').collect();
            let line = prefix + &suffix;
            // combine's errors borrow the input, so we stringify before returning.
            Error {
                pos,
                line,
                msg: format!("{}", e),
            }
            .into()
        })
}

mod grammar {
    use super::Piece;
    use combine::parser::char::{alpha_num, char, letter, string};
    use combine::parser::range::recognize;
    use combine::{attempt, choice, eof, many, none_of, skip_many, skip_many1, Parser};

    p! {
        ident() -> &'a str, {
            recognize(char('_').or(letter()).and(skip_many(char('_').or(alpha_num()))))
        }
    }

    wrapper! {
        braces(parser), {
            char('{').with(parser).skip(char('}'))
        }
    }

    p! {
        placeholder() -> Piece<'a>, {
            braces(ident()).map(Piece::Var)
        }
    }

    p! {
        escaped_brace() -> Piece<'a>, {
            attempt(string("{{"))
                .map(|_| Piece::Text("{"))
                .or(attempt(string("}}")).map(|_| Piece::Text("}")))
        }
    }

    p! {
        text() -> Piece<'a>, {
            recognize(skip_many1(none_of("{}".chars()))).map(Piece::Text)
        }
    }

    p! {
        piece() -> Piece<'a>, {
            choice((escaped_brace(), text(), placeholder()))
        }
    }

    p! {
        template() -> Vec<Piece<'a>>, {
            many(piece()).skip(eof())
        }
    }

    #[cfg(test)]
    mod test {
        use super::Piece;
        use combine::EasyParser;
        #[test]
        fn test_ident() {
            assert_eq!("job_name", super::ident().easy_parse("job_name").unwrap().0);
            assert_eq!("_x1", super::ident().easy_parse("_x1").unwrap().0);
            assert!(super::ident().easy_parse("1x").is_err());
        }
        #[test]
        fn test_placeholder() {
            assert_eq!(
                (Piece::Var("done_file"), " rest"),
                super::placeholder().easy_parse("{done_file} rest").unwrap()
            );
            assert!(super::placeholder().easy_parse("{not closed").is_err());
        }
        #[test]
        fn test_escaped_brace() {
            assert_eq!(
                Piece::Text("{"),
                super::escaped_brace().easy_parse("{{").unwrap().0
            );
            assert_eq!(
                Piece::Text("}"),
                super::escaped_brace().easy_parse("}}").unwrap().0
            );
        }
    }
}
