use clap::Parser;
use hashdis::config::Config;
use hashdis::{server, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    server::run(config).await
}
