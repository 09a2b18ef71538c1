use chrono::Local;
use clap::Parser;
use toon_corpus::{
    cli::Cli, config::TitleList, header::HeaderSet, info_time, process::Pipeline, Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Local::now();
    let cli = Cli::parse();

    let titles = TitleList::load(&cli.titles).await?;
    let headers = HeaderSet::from_raw(&cli.page_headers, &cli.image_headers)?;
    let pipeline = Pipeline::new(
        reqwest::Client::new(),
        headers,
        cli.ocr(),
        cli.layout(),
        cli.processes,
    );

    pipeline.process_run(&titles.groups).await?;
    info_time!(start_time, "Full program time:");

    Ok(())
}
