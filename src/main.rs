// wikiscrape binary: thin shell over the library.
//
// Argument handling here is deliberately minimal; every flag maps straight
// onto a ScrapeConfigBuilder call.

use std::process::ExitCode;
use std::sync::Arc;

use wikiscrape::{DirWriter, ScrapeConfigBuilder, Scraper};

fn usage() -> ! {
    eprintln!(
        "usage: wikiscrape --wiki-url <url> --output <dir> --admin-email <email>\n\
         \t[--speed <n>] [--format <token>] [--main-page <id>] [--article-list <file>]\n\
         \t[--blob-cache-url <url>] [--local-parser-url <url>] [--cache-dir <dir>]\n\
         \t[--skip-cache-cleaning] [--keep-empty-paragraphs] [--minify]"
    );
    std::process::exit(1)
}

fn parse_args() -> wikiscrape::Result<wikiscrape::ScrapeConfig> {
    let mut builder = ScrapeConfigBuilder::new();
    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        let mut value = || args.next().unwrap_or_else(|| usage());
        match flag.as_str() {
            "--wiki-url" => builder = builder.wiki_url(value()),
            "--output" => builder = builder.output_dir(value()),
            "--admin-email" => builder = builder.admin_email(value()),
            "--speed" => {
                let speed = value().parse().unwrap_or_else(|_| usage());
                builder = builder.speed(speed);
            }
            "--format" => builder = builder.format_token(&value()),
            "--main-page" => builder = builder.main_page(value()),
            "--article-list" => builder = builder.article_list(value()),
            "--blob-cache-url" => builder = builder.blob_cache_url(value()),
            "--local-parser-url" => builder = builder.local_parser_url(value()),
            "--cache-dir" => builder = builder.cache_dir(value()),
            "--skip-cache-cleaning" => builder = builder.skip_cache_cleaning(true),
            "--keep-empty-paragraphs" => builder = builder.keep_empty_paragraphs(true),
            "--minify" => builder = builder.minify_html(true),
            _ => usage(),
        }
    }
    builder.build()
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Anything escaping the orchestrator as a panic exits 42, deterministically.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_hook(info);
        log::logger().flush();
        std::process::exit(42);
    }));

    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[{}] {e}", e.category());
            return ExitCode::from(1);
        }
    };

    let writer = Arc::new(DirWriter::new(config.output_dir().clone()));
    let scraper = match Scraper::new(config, writer).await {
        Ok(scraper) => scraper,
        Err(e) => {
            eprintln!("[fatal] {e:#}");
            return ExitCode::from(1);
        }
    };

    match scraper.run().await {
        Ok(()) => {
            println!("All dumping(s) finished with success");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::logger().flush();
            eprintln!("[{}] {e}", e.category());
            ExitCode::from(1)
        }
    }
}
