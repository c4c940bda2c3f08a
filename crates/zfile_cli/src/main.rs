/* 📖 # Why is the CLI minimal?

The binary is a thin driver for poking at the file layer by hand, so arguments are
matched positionally without an argument-parsing dependency:

    zfile path <base> <leaf>      print the built path
    zfile cat <file>              print normalized lines
    zfile ls <dir>                list non-directory entries
    zfile cp <src> <dst> [--save] copy, exclusive when --save is given
    zfile mkdir <dir>             create a directory and its parents

Bounds come from `zfile.toml` in the current directory when it exists.

Exit codes:
- 0: Success
- 1: Usage error or failed operation
*/

use std::env;
use std::io::{self, Write};
use std::process;

use tracing::debug;

use zfile_base::tracing::init_tracing;
use zfile_base::{FilePath, PalHandle, RealPal, ZFileResult};
use zfile_engine::{FileMode, FileSystem, FileType, load_config};

const USAGE: &str =
    "usage: zfile <path BASE LEAF | cat FILE | ls DIR | cp SRC DST [--save] | mkdir DIR>";

/// Line capacity used by `cat`.
const LINE_CAPACITY: usize = 1024;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Path { base: String, leaf: String },
    Cat { file: String },
    Ls { dir: String },
    Cp { src: String, dst: String, save: bool },
    Mkdir { dir: String },
}

fn parse_args(args: &[String]) -> Option<Command> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let command = match args.as_slice() {
        ["path", base, leaf] => Command::Path {
            base: base.to_string(),
            leaf: leaf.to_string(),
        },
        ["cat", file] => Command::Cat {
            file: file.to_string(),
        },
        ["ls", dir] => Command::Ls {
            dir: dir.to_string(),
        },
        ["cp", src, dst] => Command::Cp {
            src: src.to_string(),
            dst: dst.to_string(),
            save: false,
        },
        ["cp", src, dst, "--save"] => Command::Cp {
            src: src.to_string(),
            dst: dst.to_string(),
            save: true,
        },
        ["mkdir", dir] => Command::Mkdir {
            dir: dir.to_string(),
        },
        _ => return None,
    };
    Some(command)
}

fn output_error(e: io::Error) -> Box<zfile_base::ZFileError> {
    zfile_base::err!("Failed to write output: {}", e)
}

fn run(fs: &FileSystem, command: Command, out: &mut impl Write) -> ZFileResult<()> {
    match command {
        Command::Path { base, leaf } => {
            let path = fs.path_build(&base, &leaf)?;
            writeln!(out, "{}", path).map_err(output_error)?;
        }
        Command::Cat { file } => {
            let path = fs.path_build(&file, "")?;
            let mut handle = fs.open(&path, FileMode::Read, FileType::Text)?;
            while let Some(line) = handle.read_line_lossy(LINE_CAPACITY)? {
                writeln!(out, "{}", line).map_err(output_error)?;
            }
            handle.close()?;
        }
        Command::Ls { dir } => {
            let path = fs.path_build(&dir, "")?;
            let mut names = fs
                .open_directory(&path)?
                .collect::<ZFileResult<Vec<String>>>()?;
            names.sort();
            for name in names {
                writeln!(out, "{}", name).map_err(output_error)?;
            }
        }
        Command::Cp { src, dst, save } => {
            let file_type = if save { FileType::Save } else { FileType::Raw };
            let src = fs.path_build(&src, "")?;
            let dst = fs.path_build(&dst, "")?;
            fs.copy(&src, &dst, file_type)?;
        }
        Command::Mkdir { dir } => {
            let path = fs.path_build(&dir, "")?;
            fs.create_directory(&path)?;
        }
    }
    Ok(())
}

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("Warning: {}", e);
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = parse_args(&args) else {
        eprintln!("{}", USAGE);
        process::exit(1);
    };
    debug!(?command, "running command");

    let current_dir = env::current_dir().unwrap_or_else(|e| {
        eprintln!("Error: Failed to get current directory: {}", e);
        process::exit(1);
    });
    let pal = PalHandle::new(RealPal::new(current_dir));

    let mut fs = FileSystem::new(pal.clone());
    let config_path = FilePath::from("zfile.toml");
    if pal.entry_kind(&config_path).is_some() {
        let config =
            load_config(&pal, &config_path).and_then(|config| fs.clone().with_config(config));
        match config {
            Ok(configured) => fs = configured,
            Err(e) => {
                eprintln!("Error: Failed to load config from zfile.toml: {}", e);
                process::exit(1);
            }
        }
    }

    let stdout = io::stdout();
    if let Err(e) = run(&fs, command, &mut stdout.lock()) {
        eprintln!("Error: {:?}", e);
        process::exit(1);
    }
}
