// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line definitions for `mooon_ssh` and `mooon_upload`.
//!
//! `-h` selects hosts, as in the historical tools, so clap's built-in help
//! flag is disabled and `-H/--help` is provided instead.

use clap::{ArgAction, Args, Parser};

use crate::transport::ExistingFilePolicy;

/// Options shared by both tools.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    #[arg(
        short = 'h',
        long,
        env = "H",
        help = "Hosts: comma-separated host[:port] entries, ranges like web[1-3], or ^file"
    )]
    pub hosts: Option<String>,

    #[arg(short = 'P', long, env = "PORT", default_value_t = 22, help = "Default SSH port")]
    pub port: u16,

    #[arg(short = 'u', long, env = "U", help = "Remote user name")]
    pub user: Option<String>,

    #[arg(
        short = 'p',
        long,
        env = "P",
        hide_env_values = true,
        help = "Remote user password"
    )]
    pub password: Option<String>,

    #[arg(
        short = 't',
        long,
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..=65535),
        help = "Connect timeout in seconds"
    )]
    pub connect_timeout: u64,

    #[arg(
        short = 'j',
        long,
        help = "Maximum hosts processed at once, 0 for no limit [default: min(tasks, 16)]"
    )]
    pub concurrency: Option<usize>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Per-host time limit in seconds (0 for unlimited)"
    )]
    pub timeout: u64,

    #[arg(
        long,
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Total connection attempts per host"
    )]
    pub retries: u32,

    #[arg(
        long,
        default_value_t = 5,
        help = "Seconds to wait for in-flight hosts after Ctrl-C and for connection close"
    )]
    pub grace: u64,

    #[arg(
        short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    #[arg(long, help = "Disable the live progress display")]
    pub no_progress: bool,

    #[arg(short = 'H', long = "help", action = ArgAction::SetTrue, help = "Print help")]
    pub help: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mooon_ssh",
    version,
    disable_help_flag = true,
    about = "Run a shell command on many hosts over SSH",
    after_help = "EXAMPLES:\n  mooon_ssh -h=192.168.31.32,192.168.31.33 -u=root -p='password' -c='whoami'\n  mooon_ssh -h=web[01-08] -P=2222 -u=ops -p=secret -c='uptime' -j=4\n  H=^hosts.txt U=root P=secret mooon_ssh -c='df -h'\n\nExit codes: 0 (all succeeded), 1 (any host failed), 2 (invalid parameters)"
)]
pub struct SshArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(short = 'c', long, help = "Command to execute on every host")]
    pub command: Option<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mooon_upload",
    version,
    disable_help_flag = true,
    about = "Upload files to many hosts over SFTP",
    after_help = "EXAMPLES:\n  mooon_upload -h=192.168.31.32,192.168.31.33 -u=root -p='password' -s=app.conf,run.sh -d=/opt/app\n  mooon_upload -h=^hosts.txt -u=root -p=secret -s='dist/*.tar.gz' -d=/srv --if-exists=overwrite\n\nExit codes: 0 (all succeeded), 1 (any upload failed), 2 (invalid parameters)"
)]
pub struct UploadArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[arg(
        short = 's',
        long,
        help = "Comma-separated local files to upload (glob patterns allowed)"
    )]
    pub sources: Option<String>,

    #[arg(short = 'd', long, help = "Remote destination directory")]
    pub destination: Option<String>,

    #[arg(
        long,
        default_value_t = ExistingFilePolicy::Fail,
        help = "What to do when the remote file exists: fail, overwrite or skip"
    )]
    pub if_exists: ExistingFilePolicy,
}
