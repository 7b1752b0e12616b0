fn main() -> anyhow::Result<()> {
    quota_cli::cli::run()
}
