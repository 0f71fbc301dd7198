// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of tack, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

use std::{env, io, path::PathBuf, process::ExitCode};

use anyhow::{bail, Context};
use tack_compiler::{compile::Compiler, Dump, Listing};

mod diag;

struct Args {
    input: PathBuf,
    output: PathBuf,
    dump: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error : {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let Some(args) = parse_args()? else {
        eprintln!("usage: tackc <input> [output] [--dump]");
        eprintln!("error : no input files");
        return Ok(ExitCode::from(2));
    };

    let mut compiler = Compiler::new();
    if let Err(err) = compiler.compile(&args.input, &args.output) {
        diag::report(&err);
        return Ok(ExitCode::FAILURE);
    }

    if args.dump {
        let stdout = io::stdout();
        Listing::new(compiler.code())
            .dump(&mut stdout.lock())
            .context("writing listing")?;
    }
    Ok(ExitCode::SUCCESS)
}

/// `tackc <input> [output] [--dump]`. The output path defaults to the input
/// with a `.tbc` extension. Returns `None` when no input was given.
fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut input = None;
    let mut output = None;
    let mut dump = false;
    for arg in env::args_os().skip(1) {
        match arg.to_str() {
            Some("--dump" | "-d") => dump = true,
            Some(opt) if opt.len() > 1 && opt.starts_with('-') => {
                bail!("unknown option '{opt}'")
            }
            _ if input.is_none() => input = Some(PathBuf::from(&arg)),
            _ if output.is_none() => output = Some(PathBuf::from(&arg)),
            _ => bail!("too many arguments"),
        }
    }
    let Some(input) = input else {
        return Ok(None);
    };
    let output = output.unwrap_or_else(|| input.with_extension("tbc"));
    Ok(Some(Args {
        input,
        output,
        dump,
    }))
}
