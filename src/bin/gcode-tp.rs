use std::process::ExitCode;

fn main() -> ExitCode {
    gcode_toolpath::cli::run()
}
