//! Command-line interface definition
//!
//! Subcommands:
//! - `upload` — chunk one or more files to the server and merge them
//! - `list` — show files already stored on the server
//! - `fetch` — download a stored file

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{UploadConfig, DEFAULT_CHUNK_SIZE, DEFAULT_SERVER};
use crate::retry::RetryPolicy;

#[derive(Debug, Parser)]
#[command(name = "muelle", version, about = "Chunked file uploads over HTTP")]
pub struct Cli {
    /// Upload endpoint base URL
    #[arg(
        short = 's',
        long = "server",
        global = true,
        default_value = DEFAULT_SERVER
    )]
    pub server: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload files in chunks and merge them server-side
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Chunk size in bytes
        #[arg(long = "chunk-size", default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Maximum chunks in flight at once
        #[arg(long = "parallel", default_value_t = 1)]
        parallel: usize,

        /// Retries per chunk before giving up
        #[arg(long = "retries", default_value_t = 0)]
        retries: u32,

        /// Send each file as a single request instead of chunking
        #[arg(long = "whole-file")]
        whole_file: bool,
    },

    /// List files stored on the server
    List,

    /// Download a stored file
    Fetch {
        /// Name of the stored file
        name: String,

        /// Destination path (defaults to the file name)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Build the upload configuration for the `upload` subcommand.
    pub fn upload_config(&self) -> UploadConfig {
        let mut config = UploadConfig {
            server: self.server.clone(),
            ..UploadConfig::default()
        };

        if let Command::Upload {
            chunk_size,
            parallel,
            retries,
            whole_file,
            ..
        } = &self.command
        {
            config.chunked = !whole_file;
            config.chunk_size = *chunk_size;
            config.max_in_flight = *parallel;
            if *retries > 0 {
                config.retry = RetryPolicy::with_retries(*retries);
            }
        }

        config
    }
}
