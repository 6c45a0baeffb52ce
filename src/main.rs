fn main() -> anyhow::Result<()> {
    quill_driver::main()
}
