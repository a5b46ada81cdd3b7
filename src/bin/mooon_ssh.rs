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

use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;

use mooon::{
    app,
    cli::SshArgs,
    config::BatchConfig,
    report::{should_use_colors, EXIT_PREFLIGHT},
    utils::init_logging,
};

#[tokio::main]
async fn main() {
    let args = SshArgs::parse();

    if args.connection.help {
        let _ = SshArgs::command().print_help();
        println!();
        // Usage output exits 1, as the historical tools did
        std::process::exit(1);
    }

    init_logging(args.connection.verbose);

    let config = match BatchConfig::from_ssh_args(&args) {
        Ok(config) => config,
        Err(e) => {
            if should_use_colors(args.connection.no_color) {
                eprintln!("{} {e}", "Error:".red());
            } else {
                eprintln!("Error: {e}");
            }
            std::process::exit(EXIT_PREFLIGHT);
        }
    };

    std::process::exit(app::execute(config).await);
}
