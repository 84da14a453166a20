fn main() -> anyhow::Result<std::process::ExitCode> {
    tagihan_lib::run()
}
