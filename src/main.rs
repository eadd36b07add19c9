use colored::Colorize;
use cos_codegen::cli;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.init_logging();
    if let Err(error) = command_line_interface.run() {
        // failed runs leave partial output behind; callers discard all of it
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
