fn main() -> anyhow::Result<()> {
    batchflow::run()
}
