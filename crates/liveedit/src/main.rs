fn main() -> anyhow::Result<()> {
    liveedit::cli::run()
}
