use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about)]
pub struct Args {
    pub file: String,
}
