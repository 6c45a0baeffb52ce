use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser as ClapParser, ValueEnum};
use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use codegen::{gen_assm, CodegenError};
use emission::{emit_to_string, write_assembly, EmitError};
pub use emission::Platform;
use lexer::{Lexer, Token};
use mir::{gen_tacky, print_tacky};
use parser::{ParseError, Parser};

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = "Runs the Quill C compiler")]
struct CLI {
    /// Path to C source file
    path: PathBuf,

    /// Specifies a point in the compilation process for Quill to stop, only one(1) option can be specified at a time
    #[command(flatten)]
    stage_options: StageOptions,

    /// Platform whose symbol conventions the assembly follows, defaults to the host
    #[arg(long, value_enum)]
    target: Option<Target>,

    /// Where to write the assembly, defaults to the source path with a ".s" extension
    #[arg(short = 'o')]
    output: Option<PathBuf>,
}

/// Run C compiler with optional arguments
#[derive(Args, Debug)]
#[group(required = false, multiple = false)]
struct StageOptions {
    /// Stop after lexer and print the tokens
    #[arg(long)]
    lex: bool,

    /// Stop after parser and print the AST
    #[arg(long)]
    parse: bool,

    /// Stop after TACKY generation and print it
    #[arg(long)]
    tacky: bool,

    /// Stop after assembly generation and print the assembly tree
    #[arg(long)]
    codegen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Linux,
    Macos,
}

impl From<Target> for Platform {
    fn from(target: Target) -> Self {
        match target {
            Target::Linux => Platform::Linux,
            Target::Macos => Platform::MacOs,
        }
    }
}

/// Which stage the compiler should stop at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopStage {
    Lexer,
    Parser,
    Tacky,
    CodeGen,
}

impl StopStage {
    fn from_args(options: &StageOptions) -> Option<StopStage> {
        if options.lex {
            Some(StopStage::Lexer)
        } else if options.parse {
            Some(StopStage::Parser)
        } else if options.tacky {
            Some(StopStage::Tacky)
        } else if options.codegen {
            Some(StopStage::CodeGen)
        } else {
            None
        }
    }
}

#[derive(Error, Debug)]
pub enum CompileErr {
    #[error("Lexer encountered an error(s):\n{}", .0.join("\n"))]
    Lexer(Vec<String>),
    #[error("Parser encountered an error")]
    Parser(#[from] ParseError),
    #[error("Codegen encountered an error")]
    CodeGen(#[from] CodegenError),
    #[error("Emission encountered an error")]
    Emission(#[from] EmitError),
}

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = CLI::parse();

    let stop_stage = StopStage::from_args(&args.stage_options);
    let platform = args.target.map(Platform::from).unwrap_or_else(Platform::host);

    run_driver(&args.path, args.output.as_deref(), stop_stage, platform)
}

fn run_driver(
    path: &Path,
    output_path: Option<&Path>,
    stop_stage: Option<StopStage>,
    platform: Platform,
) -> Result<()> {
    let Some(stop_stage) = stop_stage else {
        let assembly_path = match output_path {
            Some(out) => out.to_path_buf(),
            None => path.with_extension("s"),
        };

        compile_file(path, &assembly_path, platform)?;
        info!("compiled {} to {}", path.display(), assembly_path.display());

        return Ok(());
    };

    let source = read_to_string(path)
        .with_context(|| format!("Unable to read source file: {}", path.display()))?;

    let tokens = lex(&source, &display_name(path))?;

    if stop_stage == StopStage::Lexer {
        println!("{}", tokens.iter().join("\n"));
        return Ok(());
    }

    let ast = Parser::new(tokens).parse().map_err(CompileErr::from)?;

    if stop_stage == StopStage::Parser {
        println!("{:#?}", ast);
        return Ok(());
    }

    let tacky = gen_tacky(ast);

    if stop_stage == StopStage::Tacky {
        let stdout = std::io::stdout();
        print_tacky(&mut stdout.lock(), &tacky)?;
        return Ok(());
    }

    let assm = gen_assm(&tacky).map_err(CompileErr::from)?;
    println!("{:#?}", assm);

    Ok(())
}

/// Compiles a source file straight to an assembly file. Nothing is written
/// unless every stage succeeds.
pub fn compile_file(path: &Path, assembly_path: &Path, platform: Platform) -> Result<()> {
    let source = read_to_string(path)
        .with_context(|| format!("Unable to read source file: {}", path.display()))?;

    let text = compile_source(&source, &display_name(path), platform)?;

    write_assembly(assembly_path, &text)
        .map_err(CompileErr::from)
        .with_context(|| format!("Unable to write {}", assembly_path.display()))?;

    Ok(())
}

/// Runs every stage over in-memory source and returns the assembly text
pub fn compile_source(
    source: &str,
    file_name: &str,
    platform: Platform,
) -> Result<String, CompileErr> {
    let tokens = lex(source, file_name)?;
    let ast = Parser::new(tokens).parse()?;
    let tacky = gen_tacky(ast);
    let assm = gen_assm(&tacky)?;

    Ok(emit_to_string(&assm, platform)?)
}

fn lex(source: &str, file_name: &str) -> Result<Vec<Token>, CompileErr> {
    let tokens = Lexer::new(source).tokenize_all().map_err(|errors| {
        CompileErr::Lexer(
            errors
                .iter()
                .map(|err| {
                    format!(
                        "{} at {}:{}:{}: '{}'",
                        err.error().map_or("error".to_string(), |e| e.to_string()),
                        file_name,
                        err.line,
                        err.col,
                        err.text
                    )
                })
                .collect(),
        )
    })?;

    debug!("lexed {} tokens from {}", tokens.len(), file_name);

    Ok(tokens)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
