use crate::core::constants::{env, layout, shim};
use crate::core::resolver::{ResolvedVersion, VersionResolver};
use crate::error::{AppError, AppResult};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::{Child, Command};
use tracing::debug;

/// 以代理身份运行：解析版本后执行真正的 Maven 命令
pub struct ShimExecutor {
    resolver: VersionResolver,
    debug: bool,
}

impl ShimExecutor {
    pub fn new(resolver: VersionResolver, debug: bool) -> Self {
        Self { resolver, debug }
    }

    /// 从调用路径取命令名
    pub fn command_name(argv0: &OsStr) -> Option<String> {
        let name = Path::new(argv0).file_name()?.to_str()?;
        let name = name.strip_suffix(".exe").unwrap_or(name);
        (!name.is_empty()).then(|| name.to_string())
    }

    /// 命令名是否应按代理处理（核心命令，或 shims 目录中存在同名代理）
    pub fn is_shim_command(name: &str, shims_dir: &Path) -> bool {
        if name == env!("CARGO_PKG_NAME") {
            return false;
        }
        shim::CORE_COMMANDS.contains(&name) || shims_dir.join(name).is_file()
    }

    pub fn target_path(resolved: &ResolvedVersion, command: &str) -> PathBuf {
        resolved.path.join(layout::BIN_DIR).join(command)
    }

    /// 解析版本并定位目标可执行文件
    pub fn prepare(&self, command: &str) -> AppResult<(ResolvedVersion, PathBuf)> {
        let resolved = self.resolver.resolve()?;
        let target = Self::target_path(&resolved, command);
        if !target.is_file() {
            return Err(AppError::ShimTargetMissing {
                command: command.to_string(),
                version: resolved.version,
                path: target.display().to_string(),
            });
        }
        Ok((resolved, target))
    }

    /// 执行代理，返回进程退出码
    ///
    /// 正常结束时为子进程的退出码；无法解析或无法启动时为 1。
    pub async fn run(&self, command: &str, args: Vec<OsString>) -> i32 {
        let started = Instant::now();
        let (resolved, target) = match self.prepare(command) {
            Ok(prepared) => prepared,
            Err(e) => {
                report(command, &e);
                return shim::FAILURE_EXIT_CODE;
            }
        };
        if self.debug {
            debug!(
                command,
                version = %resolved.version,
                source = %resolved.source,
                target = %target.display(),
                resolve_ms = started.elapsed().as_millis() as u64,
                "shim 已解析"
            );
        }

        let spawned = Instant::now();
        match self.execute(&resolved, &target, &args).await {
            Ok(status) => {
                let code = exit_code(status);
                if self.debug {
                    debug!(
                        command,
                        code,
                        run_ms = spawned.elapsed().as_millis() as u64,
                        total_ms = started.elapsed().as_millis() as u64,
                        "子进程已退出"
                    );
                }
                code
            }
            Err(e) => {
                report(command, &AppError::Io(e));
                shim::FAILURE_EXIT_CODE
            }
        }
    }

    async fn execute(
        &self,
        resolved: &ResolvedVersion,
        target: &Path,
        args: &[OsString],
    ) -> std::io::Result<ExitStatus> {
        let mut child = Command::new(target)
            .args(args)
            .env(env::TOOL_HOME, &resolved.path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        loop {
            tokio::select! {
                status = child.wait() => return status,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    forward_interrupt(&child, self.debug);
                }
            }
        }
    }
}

fn report(command: &str, error: &AppError) {
    eprintln!("mvnenv: {command}: {error}");
    for hint in error.suggestions() {
        eprintln!("  💡 {hint}");
    }
}

/// 把中断信号转交给子进程，由子进程自行决定如何退出
#[cfg(unix)]
fn forward_interrupt(child: &Child, debug: bool) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else { return };
    if debug {
        debug!(pid, "转发 SIGINT 给子进程");
    }
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        debug!(pid, error = %e, "转发 SIGINT 失败");
    }
}

/// Windows 控制台会把 Ctrl+C 同时投递给子进程
#[cfg(not(unix))]
fn forward_interrupt(child: &Child, debug: bool) {
    if debug {
        debug!(pid = ?child.id(), "子进程将直接收到中断");
    }
}

/// 子进程被信号终止时返回 128 + 信号值
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return shim::SIGNAL_EXIT_BASE + signal;
        }
    }
    shim::FAILURE_EXIT_CODE
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigStore;
    use crate::utils::logging::{self, testing::CapturedLog};
    use crate::utils::MvnenvPaths;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::OnceLock;
    use std::time::Duration;
    use tempfile::TempDir;

    /// 启动子进程的测试串行执行，避免发给本进程的 SIGINT 被转发到别的测试的子进程
    async fn serial() -> tokio::sync::MutexGuard<'static, ()> {
        static LOCK: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| tokio::sync::Mutex::new(())).lock().await
    }

    struct Fixture {
        _dir: TempDir,
        paths: MvnenvPaths,
        cwd: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let paths = MvnenvPaths::new(dir.path().join("root"));
            let cwd = dir.path().join("project");
            fs::create_dir_all(&cwd).unwrap();
            Self {
                _dir: dir,
                paths,
                cwd,
            }
        }

        fn install_script(&self, version: &str, command: &str, body: &str) {
            let path = self.paths.bin_dir(version).join(command);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            if command != "mvn" && !self.paths.is_installed(version) {
                self.install_script(version, "mvn", "exit 0");
            }
        }

        fn executor(&self, session: Option<&str>) -> ShimExecutor {
            self.executor_with_debug(session, false)
        }

        fn executor_with_debug(&self, session: Option<&str>, debug: bool) -> ShimExecutor {
            let resolver = VersionResolver::new(
                self.paths.clone(),
                ConfigStore::new(self.paths.config_file()),
                session.map(str::to_string),
                &self.cwd,
            );
            ShimExecutor::new(resolver, debug)
        }
    }

    #[test]
    fn test_command_name_from_invocation_path() {
        assert_eq!(
            ShimExecutor::command_name(OsStr::new("/home/u/.mvnenv/shims/mvnDebug")),
            Some("mvnDebug".to_string())
        );
        assert_eq!(
            ShimExecutor::command_name(OsStr::new("mvn.exe")),
            Some("mvn".to_string())
        );
        assert_eq!(ShimExecutor::command_name(OsStr::new("/")), None);
    }

    #[test]
    fn test_is_shim_command() {
        let fx = Fixture::new();
        assert!(ShimExecutor::is_shim_command("mvn", &fx.paths.shims_dir()));
        assert!(!ShimExecutor::is_shim_command("mvnenv", &fx.paths.shims_dir()));
        assert!(!ShimExecutor::is_shim_command("custom", &fx.paths.shims_dir()));

        fs::create_dir_all(fx.paths.shims_dir()).unwrap();
        fs::write(fx.paths.shims_dir().join("custom"), "").unwrap();
        assert!(ShimExecutor::is_shim_command("custom", &fx.paths.shims_dir()));
    }

    #[tokio::test]
    async fn test_preserves_child_exit_code() {
        let _serial = serial().await;
        let fx = Fixture::new();
        fx.install_script("3.9.6", "mvn", "exit 42");
        let code = fx.executor(Some("3.9.6")).run("mvn", Vec::new()).await;
        assert_eq!(code, 42);
    }

    #[tokio::test]
    async fn test_forwards_arguments_and_maven_home() {
        let _serial = serial().await;
        let fx = Fixture::new();
        fx.install_script(
            "3.9.6",
            "mvn",
            r#"out="$MAVEN_HOME/args.txt"
for arg in "$@"; do printf '[%s]\n' "$arg" >> "$out"; done
printf 'home=%s\n' "$MAVEN_HOME" >> "$out"
exit 0"#,
        );

        let args = vec![
            OsString::from("clean"),
            OsString::from("-Dmessage=hello world"),
            OsString::from("  padded  "),
            OsString::from(""),
        ];
        let code = fx.executor(Some("3.9.6")).run("mvn", args).await;
        assert_eq!(code, 0);

        let output = fs::read_to_string(fx.paths.version_dir("3.9.6").join("args.txt")).unwrap();
        let expected = format!(
            "[clean]\n[-Dmessage=hello world]\n[  padded  ]\n[]\nhome={}\n",
            fx.paths.version_dir("3.9.6").display()
        );
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn test_resolution_failure_exits_one() {
        let fx = Fixture::new();
        assert_eq!(fx.executor(None).run("mvn", Vec::new()).await, 1);
        assert_eq!(fx.executor(Some("3.9.6")).run("mvn", Vec::new()).await, 1);
    }

    #[tokio::test]
    async fn test_missing_target_is_distinguished_from_resolution_failure() {
        let fx = Fixture::new();
        fx.install_script("3.9.6", "mvn", "exit 0");

        let err = fx.executor(Some("3.9.6")).prepare("mvnyjp").unwrap_err();
        assert!(matches!(err, AppError::ShimTargetMissing { ref command, .. } if command == "mvnyjp"));
        assert_eq!(fx.executor(Some("3.9.6")).run("mvnyjp", Vec::new()).await, 1);
    }

    #[tokio::test]
    async fn test_signal_termination_maps_to_128_plus_signal() {
        let _serial = serial().await;
        let fx = Fixture::new();
        fx.install_script("3.9.6", "mvn", "kill -TERM $$");
        let code = fx.executor(Some("3.9.6")).run("mvn", Vec::new()).await;
        assert_eq!(code, 128 + 15);
    }

    #[tokio::test]
    async fn test_interrupt_is_forwarded_to_child() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let _serial = serial().await;
        let fx = Fixture::new();
        fx.install_script(
            "3.9.6",
            "mvn",
            r#"trap 'echo interrupted > "$MAVEN_HOME/trapped"; exit 7' INT
touch "$MAVEN_HOME/ready"
while :; do sleep 1; done"#,
        );
        let home = fx.paths.version_dir("3.9.6");
        let ready = home.join("ready");
        let executor = fx.executor(Some("3.9.6"));

        // 子进程就绪时代理已在等待中断信号
        let interrupt = async {
            while !ready.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            kill(Pid::from_raw(std::process::id() as i32), Signal::SIGINT).unwrap();
        };
        let (code, ()) = tokio::time::timeout(Duration::from_secs(20), async {
            tokio::join!(executor.run("mvn", Vec::new()), interrupt)
        })
        .await
        .expect("shim should exit once the child handles SIGINT");

        assert_eq!(code, 7);
        assert_eq!(fs::read_to_string(home.join("trapped")).unwrap(), "interrupted\n");
    }

    #[tokio::test]
    async fn test_debug_diagnostics_go_to_the_log_writer() {
        let _serial = serial().await;
        let fx = Fixture::new();
        fx.install_script("3.9.6", "mvn", "exit 3");
        let captured = CapturedLog::default();
        let _log = tracing::subscriber::set_default(logging::subscriber("debug", captured.clone()));

        let code = fx
            .executor_with_debug(Some("3.9.6"), true)
            .run("mvn", Vec::new())
            .await;

        assert_eq!(code, 3);
        let text = captured.text();
        assert!(text.contains("shim 已解析"));
        assert!(text.contains("3.9.6"));
        assert!(text.contains(&fx.paths.bin_dir("3.9.6").join("mvn").display().to_string()));
        assert!(text.contains("子进程已退出"));
    }

    #[tokio::test]
    async fn test_no_diagnostics_without_debug() {
        let _serial = serial().await;
        let fx = Fixture::new();
        fx.install_script("3.9.6", "mvn", "exit 0");
        let captured = CapturedLog::default();
        let _log = tracing::subscriber::set_default(logging::subscriber("debug", captured.clone()));

        let code = fx.executor(Some("3.9.6")).run("mvn", Vec::new()).await;

        assert_eq!(code, 0);
        let text = captured.text();
        assert!(!text.contains("shim 已解析"));
        assert!(!text.contains("子进程已退出"));
    }
}
