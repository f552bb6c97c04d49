use std::process::ExitCode;

fn main() -> ExitCode {
  squad_wellness_lib::run()
}
