use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;

use overdrive::{
    Args, OutputFormat, RunOptions, Settings, fake_hardware_client, real_hardware_client, run,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = std::io::stdout();

    let run_result = async {
        let output_format = args.output_format().unwrap_or(if stdout.is_terminal() {
            OutputFormat::Pretty
        } else {
            OutputFormat::Json
        });
        let options = RunOptions::builder()
            .settings(Settings::load(args.config_path())?)
            .output_format(output_format)
            .maybe_log_level(args.log_level())
            .build();
        let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
        let hardware_client = match maybe_fake_args {
            Some(fake_args) => fake_hardware_client(fake_args),
            None => real_hardware_client(),
        };

        run(command, &mut stdout, hardware_client, options).await
    }
    .await;

    match run_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
