use clap::Parser;

fn main() -> std::process::ExitCode {
    let args = aintpro::cli::CliArgs::parse();
    aintpro::cli::run(args)
}
