fn main() -> std::process::ExitCode {
    rootpilot::run()
}
