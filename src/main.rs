use clap::Parser;
use mvnenv::cli::{Cli, CommandHandler};
use mvnenv::core::constants::{env, log, shim};
use mvnenv::shim::ShimExecutor;
use mvnenv::utils::{logging, EnvLookup, EnvVarUtils, MvnenvPaths};
use mvnenv::VersionResolver;
use std::ffi::OsString;
use std::process;

#[tokio::main]
async fn main() {
    let lookup = EnvVarUtils::process_lookup();
    let mut args = std::env::args_os();
    let argv0 = args.next().unwrap_or_default();

    // 以 mvn / mvnDebug 等名称被调用时按代理运行
    if let Some(command) = ShimExecutor::command_name(&argv0) {
        if command != env!("CARGO_PKG_NAME") {
            match MvnenvPaths::from_env(&lookup) {
                Ok(paths) if ShimExecutor::is_shim_command(&command, &paths.shims_dir()) => {
                    let code = run_shim(paths, &lookup, &command, args.collect()).await;
                    process::exit(code);
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("mvnenv: {command}: {e}");
                    process::exit(shim::FAILURE_EXIT_CODE);
                }
            }
        }
    }

    logging::init(lookup(env::LOG).as_deref().unwrap_or(log::DEFAULT_FILTER));

    // 参数错误由 clap 以退出码 2 结束进程
    let cli = Cli::parse_from(std::iter::once(argv0).chain(args));

    let handler = match CommandHandler::new(lookup) {
        Ok(handler) => handler,
        Err(e) => {
            eprint!("{}", e.with_context("初始化 mvnenv").user_message());
            process::exit(1);
        }
    };

    if let Err(e) = handler.handle_command(cli.command).await {
        eprint!("{}", e.user_message());
        process::exit(1);
    }
}

async fn run_shim(paths: MvnenvPaths, lookup: &EnvLookup, command: &str, args: Vec<OsString>) -> i32 {
    let debug = EnvVarUtils::is_truthy(lookup(env::DEBUG).as_deref());
    if debug {
        logging::init("debug");
    }

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("mvnenv: {command}: 无法获取当前目录: {e}");
            return shim::FAILURE_EXIT_CODE;
        }
    };
    let resolver = VersionResolver::from_env(paths, lookup, cwd);
    ShimExecutor::new(resolver, debug).run(command, args).await
}
