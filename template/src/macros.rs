// Declares a combine parser over `&str` range streams.
// Template parsers never produce numbers, so unlike a general-purpose
// grammar we don't need the int/float conversion bounds on the stream error.
macro_rules! p (
    ($name:ident() -> $ret:ty, $code:expr) => (
        combine::parser!{
            pub fn $name['a, I]()(I) -> $ret
                where
                [I: combine::stream::RangeStream<
                 Range = &'a str,
                 Token = char>,
                 I::Error: combine::ParseError<char, &'a str, <I as combine::stream::StreamOnce>::Position>,
            ]            {
                $code
            }
        }
    );
);

// Wraps another parser, e.g. to surround it with delimiters.
macro_rules! wrapper {
    ($name:ident($delegate: ident), $code:expr) => (
        combine::parser!{
            pub fn $name['a, I, P]($delegate: P)(I) -> P::Output
                where
                [I: combine::stream::RangeStream<
                 Range = &'a str,
                 Token = char>,
                 I::Error: combine::ParseError<char, &'a str, <I as combine::stream::StreamOnce>::Position>,
                 P: combine::Parser<I>,
            ]            {
                $code
            }
        }
    );
}
