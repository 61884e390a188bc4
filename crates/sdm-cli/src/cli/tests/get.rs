//! Tests for `sdm get`.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_get_single_url() {
    match parse(&["sdm", "get", "https://example.com/file.iso"]) {
        CliCommand::Get {
            urls,
            dir,
            jobs,
            workers,
        } => {
            assert_eq!(urls, vec!["https://example.com/file.iso"]);
            assert!(dir.is_none());
            assert!(jobs.is_none());
            assert!(workers.is_none());
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_get_with_options() {
    match parse(&[
        "sdm",
        "get",
        "-d",
        "/tmp/dl",
        "-j",
        "4",
        "--workers",
        "8",
        "https://a.example/1.bin",
        "https://b.example/2.bin",
    ]) {
        CliCommand::Get {
            urls,
            dir,
            jobs,
            workers,
        } => {
            assert_eq!(urls.len(), 2);
            assert_eq!(dir, Some(PathBuf::from("/tmp/dl")));
            assert_eq!(jobs, Some(4));
            assert_eq!(workers, Some(8));
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_get_requires_a_url() {
    assert!(Cli::try_parse_from(["sdm", "get"]).is_err());
}
