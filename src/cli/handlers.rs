use crate::cli::commands::*;
use crate::cli::output::{self, OutputFormat};
use crate::core::constants::{env, layout};
use crate::core::resolver::{find_marker, write_marker, VersionResolver};
use crate::core::version::Version;
use crate::error::{AppError, AppResult, ContextualResult, ResultExt};
use crate::infrastructure::config::ConfigStore;
use crate::infrastructure::credentials::{Credential, CredentialStore, SecretToolStore};
use crate::infrastructure::installer::Installer;
use crate::infrastructure::remote::{MetadataCache, RepositoryContext, RepositoryManager};
use crate::infrastructure::repository_config::{
    AuthConfig, RepositoryConfigStore, RepositoryEntry, RepositoryType, TlsConfig,
};
use crate::infrastructure::shell::{
    detect_shell, export_command, unset_command, EnvironmentRegistrar, ProfileRegistrar, ShellType,
};
use crate::shim::ShimGenerator;
use crate::utils::{EnvLookup, EnvVarUtils, FileSystemUtils, MvnenvPaths};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;

/// 命令处理器
pub struct CommandHandler {
    paths: MvnenvPaths,
    env: EnvLookup,
    cwd: PathBuf,
}

impl CommandHandler {
    /// 基于真实进程环境创建
    pub fn new(env: EnvLookup) -> AppResult<Self> {
        let paths = MvnenvPaths::from_env(&env)?;
        let cwd = std::env::current_dir()?;
        Ok(Self::with_parts(paths, env, cwd))
    }

    pub fn with_parts(paths: MvnenvPaths, env: EnvLookup, cwd: PathBuf) -> Self {
        Self { paths, env, cwd }
    }

    /// 处理命令
    pub async fn handle_command(&self, command: Commands) -> ContextualResult<()> {
        match command {
            Commands::Install { version, force } => self.handle_install(&version, force).await,
            Commands::Uninstall { version } => self.handle_uninstall(&version).await,
            Commands::List { json } => self.handle_list(OutputFormat::from_flag(json)),
            Commands::ListRemote {
                refresh,
                limit,
                json,
            } => {
                self.handle_list_remote(refresh, limit, OutputFormat::from_flag(json))
                    .await
            }
            Commands::Current { json } => self.handle_current(OutputFormat::from_flag(json)),
            Commands::Global { version, unset } => self.handle_global(version, unset),
            Commands::Local { version, unset } => self.handle_local(version, unset),
            Commands::Shell {
                version,
                unset,
                shell,
            } => self.handle_shell(version, unset, shell),
            Commands::Rehash => self.handle_rehash(),
            Commands::Repo { action } => self.handle_repo_command(action).await,
            Commands::Credential { action } => self.handle_credential_command(action).await,
            Commands::Cache { action } => self.handle_cache_command(action),
            Commands::Setup => self.handle_setup(),
        }
    }

    fn config_store(&self) -> ConfigStore {
        ConfigStore::new(self.paths.config_file())
    }

    fn credential_store(&self) -> Arc<dyn CredentialStore> {
        Arc::new(SecretToolStore::new())
    }

    fn repository_manager(&self) -> AppResult<RepositoryManager> {
        let config = self.config_store().load()?;
        RepositoryManager::new(
            RepositoryConfigStore::new(self.paths.repositories_file(), self.env.clone()),
            MetadataCache::new(self.paths.cache_file(), config.cache.ttl()),
            RepositoryContext::new(self.credential_store(), config.network.clone()),
            config.network.repository_timeout(),
        )
    }

    fn installer(&self) -> AppResult<Installer> {
        Ok(Installer::new(
            self.paths.clone(),
            Arc::new(self.repository_manager()?),
            self.config_store(),
            ShimGenerator::for_current_exe(self.paths.clone())?,
        ))
    }

    fn resolver(&self) -> VersionResolver {
        VersionResolver::from_env(self.paths.clone(), &self.env, &self.cwd)
    }

    async fn handle_install(&self, version: &str, force: bool) -> ContextualResult<()> {
        let operation = format!("安装 Maven {version}");
        let installer = self.installer().context(&operation)?;

        println!("🚀 正在安装 Maven {version}...");
        let pb = output::create_progress_bar();
        let cancel = cancel_on_interrupt();
        let result = installer
            .install(
                version,
                force,
                Some(output::progress_callback(pb.clone())),
                &cancel,
            )
            .await;
        pb.finish_and_clear();

        let outcome = result.context(&operation)?;
        println!("✅ Maven {} 安装成功（来源: {}）", outcome.version, outcome.repository);
        println!("📁 安装路径: {}", outcome.path.display());
        if !outcome.verified {
            println!("⚠️  来源未提供校验文件，未进行摘要校验");
        }
        Ok(())
    }

    async fn handle_uninstall(&self, version: &str) -> ContextualResult<()> {
        let operation = format!("卸载 Maven {version}");
        let outcome = self
            .installer()
            .context(&operation)?
            .uninstall(version)
            .await
            .context(&operation)?;
        println!("🗑️  Maven {} 已卸载", outcome.version);
        if outcome.default_cleared {
            println!("💡 该版本是全局默认版本，已清除默认设置");
        }
        Ok(())
    }

    fn handle_list(&self, format: OutputFormat) -> ContextualResult<()> {
        let operation = "列出已安装版本";
        let versions = self.installer().context(operation)?.list_installed().context(operation)?;
        let current = self.resolver().resolve().ok();
        print!(
            "{}",
            output::format_installed(&versions, current.as_ref(), format).context(operation)?
        );
        Ok(())
    }

    async fn handle_list_remote(
        &self,
        refresh: bool,
        limit: Option<usize>,
        format: OutputFormat,
    ) -> ContextualResult<()> {
        let operation = "查询可用版本";
        let manager = self.repository_manager().context(operation)?;
        let cancel = cancel_on_interrupt();
        let mut versions = manager
            .discover_versions(refresh, &cancel)
            .await
            .context(operation)?;
        if let Some(limit) = limit {
            versions.truncate(limit);
        }
        let installed = self
            .installer()
            .context(operation)?
            .list_installed()
            .context(operation)?;
        print!(
            "{}",
            output::format_remote(&versions, &installed, format).context(operation)?
        );
        Ok(())
    }

    fn handle_current(&self, format: OutputFormat) -> ContextualResult<()> {
        let resolved = self.resolver().resolve().context("解析当前版本")?;
        print!(
            "{}",
            output::format_current(&resolved, format).context("解析当前版本")?
        );
        Ok(())
    }

    fn handle_global(&self, version: Option<String>, unset: bool) -> ContextualResult<()> {
        let operation = "设置全局版本";
        if unset {
            self.config_store()
                .set_default_version(None)
                .context(operation)?;
            println!("✅ 已清除全局默认版本");
            return Ok(());
        }
        match version {
            Some(version) => {
                self.installer()
                    .context(operation)?
                    .set_default(&version)
                    .context(operation)?;
                println!("✅ 全局默认版本已设置为 {version}");
            }
            None => match self.config_store().default_version().context(operation)? {
                Some(version) => println!("{version}"),
                None => println!("未设置全局默认版本"),
            },
        }
        Ok(())
    }

    fn handle_local(&self, version: Option<String>, unset: bool) -> ContextualResult<()> {
        let operation = "设置项目版本";
        if unset {
            FileSystemUtils::remove_file(&self.cwd.join(layout::MARKER_FILE)).context(operation)?;
            println!("✅ 已删除 {}", layout::MARKER_FILE);
            return Ok(());
        }
        match version {
            Some(version) => {
                let marker = write_marker(&self.cwd, &version).context(operation)?;
                println!("✅ 已写入 {}: {version}", marker.display());
                if !self.paths.is_installed(&version) {
                    println!("💡 该版本尚未安装，请执行: mvnenv install {version}");
                }
            }
            None => match find_marker(&self.cwd).context(operation)? {
                Some((_, Some(version))) => println!("{version}"),
                Some((marker, None)) => println!("{} 为空", marker.display()),
                None => println!("当前目录及其上级目录中没有 {}", layout::MARKER_FILE),
            },
        }
        Ok(())
    }

    fn handle_shell(
        &self,
        version: Option<String>,
        unset: bool,
        shell: Option<String>,
    ) -> ContextualResult<()> {
        let operation = "设置会话版本";
        let shell_type = match shell {
            Some(name) => ShellType::from_name(&name)
                .ok_or_else(|| AppError::invalid_config(format!("不支持的 shell: {name}")))
                .context(operation)?,
            None => detect_shell(&self.env),
        };

        if unset {
            println!("{}", unset_command(env::SESSION_VERSION, shell_type));
            return Ok(());
        }
        match version {
            Some(version) => {
                let version = Version::parse(&version).context(operation)?;
                if !self.paths.is_installed(version.as_str()) {
                    eprintln!("💡 Maven {version} 尚未安装，请执行: mvnenv install {version}");
                }
                println!(
                    "{}",
                    export_command(env::SESSION_VERSION, version.as_str(), shell_type)
                );
            }
            None => match EnvVarUtils::non_empty(&self.env, env::SESSION_VERSION) {
                Some(version) => println!("{version}"),
                None => eprintln!("未设置会话版本 ({})", env::SESSION_VERSION),
            },
        }
        Ok(())
    }

    fn handle_rehash(&self) -> ContextualResult<()> {
        let operation = "重新生成代理";
        let commands = ShimGenerator::for_current_exe(self.paths.clone())
            .context(operation)?
            .rehash()
            .context(operation)?;
        println!(
            "✅ 已生成 {} 个代理: {}",
            commands.len(),
            commands.join(", ")
        );
        Ok(())
    }

    async fn handle_repo_command(&self, action: RepoCommands) -> ContextualResult<()> {
        match action {
            RepoCommands::Add {
                name,
                url,
                kind,
                priority,
                disabled,
                auth,
                username,
                password,
                token,
                ca_cert,
                insecure,
            } => {
                let operation = format!("添加仓库 {name}");
                let repo_type = match kind {
                    RepoKind::Nexus => RepositoryType::Nexus,
                    RepoKind::Archive => RepositoryType::Archive,
                };
                let mut entry = RepositoryEntry::new(&name, repo_type, &url, priority);
                entry.enabled = !disabled;
                entry.auth = match auth {
                    Some(AuthKind::Basic) => Some(AuthConfig::Basic { username, password }),
                    Some(AuthKind::Bearer) => Some(AuthConfig::Bearer { token }),
                    None => None,
                };
                if ca_cert.is_some() || insecure {
                    entry.tls = Some(TlsConfig { ca_cert, insecure });
                }
                if matches!(&entry.auth, Some(AuthConfig::Basic { password: Some(p), .. }) if !EnvVarUtils::has_placeholder(p))
                {
                    eprintln!("⚠️  密码将以明文写入配置文件，建议改用 ${{VAR}} 或 mvnenv credential set");
                }

                let mut manager = self.repository_manager().context(&operation)?;
                manager.add_repository(entry).context(&operation)?;
                println!("✅ 已添加仓库 {name}（优先级 {priority}）");
            }
            RepoCommands::Remove { name } => {
                let operation = format!("删除仓库 {name}");
                let mut manager = self.repository_manager().context(&operation)?;
                manager.remove_repository(&name).await.context(&operation)?;
                println!("✅ 已删除仓库 {name}");
            }
            RepoCommands::List { json } => {
                let operation = "列出仓库";
                let entries = self
                    .repository_manager()
                    .context(operation)?
                    .entries()
                    .context(operation)?;
                print!(
                    "{}",
                    output::format_repositories(&entries, OutputFormat::from_flag(json))
                        .context(operation)?
                );
            }
        }
        Ok(())
    }

    async fn handle_credential_command(&self, action: CredentialCommands) -> ContextualResult<()> {
        let store = self.credential_store();
        match action {
            CredentialCommands::Set {
                repository,
                username,
                secret_env,
            } => {
                let operation = format!("保存仓库 {repository} 的凭据");
                self.ensure_repository(&repository).context(&operation)?;
                let secret = match secret_env {
                    Some(var) => EnvVarUtils::non_empty(&self.env, &var).ok_or_else(|| {
                        AppError::invalid_config(format!("环境变量 {var} 未设置"))
                    }),
                    None => read_secret_line().await,
                }
                .context(&operation)?;

                store
                    .store(&repository, &Credential::new(username, secret))
                    .await
                    .context(&operation)?;
                println!("🔐 已保存仓库 {repository} 的凭据");
            }
            CredentialCommands::Delete { repository } => {
                let operation = format!("删除仓库 {repository} 的凭据");
                store.delete(&repository).await.context(&operation)?;
                println!("✅ 已删除仓库 {repository} 的凭据");
            }
        }
        Ok(())
    }

    fn ensure_repository(&self, name: &str) -> AppResult<()> {
        let entries = RepositoryConfigStore::new(self.paths.repositories_file(), self.env.clone())
            .load_raw()?;
        if entries.iter().any(|e| e.name == name) {
            Ok(())
        } else {
            Err(AppError::RepositoryNotFound {
                name: name.to_string(),
            })
        }
    }

    fn handle_cache_command(&self, action: CacheCommands) -> ContextualResult<()> {
        match action {
            CacheCommands::Clear => {
                let operation = "清除版本缓存";
                let config = self.config_store().load().context(operation)?;
                MetadataCache::new(self.paths.cache_file(), config.cache.ttl())
                    .invalidate()
                    .context(operation)?;
                println!("🧹 版本缓存已清除");
            }
        }
        Ok(())
    }

    fn handle_setup(&self) -> ContextualResult<()> {
        let operation = "注册 mvnenv 环境";
        ShimGenerator::for_current_exe(self.paths.clone())
            .context(operation)?
            .rehash()
            .context(operation)?;
        let outcome = ProfileRegistrar::for_home(self.paths.clone())
            .context(operation)?
            .register()
            .context(operation)?;

        println!("✅ 已生成 {}", outcome.script.display());
        if outcome.profile_updated {
            println!("📝 已在 {} 中添加加载语句", outcome.profile.display());
        } else {
            println!("📝 {} 已包含加载语句", outcome.profile.display());
        }
        println!("💡 重新登录，或执行: . {}", outcome.script.display());
        Ok(())
    }
}

/// Ctrl+C 时取消正在进行的网络操作
fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

/// 从标准输入读取一行作为密码
async fn read_secret_line() -> AppResult<String> {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let line = lines.next_line().await?.unwrap_or_default();
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        return Err(AppError::invalid_config("标准输入中没有读取到密码"));
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersionSource;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn handler(dir: &TempDir, env: HashMap<String, String>) -> CommandHandler {
        let cwd = dir.path().join("project");
        fs::create_dir_all(&cwd).unwrap();
        CommandHandler::with_parts(
            MvnenvPaths::new(dir.path().join("root")),
            EnvVarUtils::map_lookup(env),
            cwd,
        )
    }

    fn fake_install(handler: &CommandHandler, version: &str) {
        let exe = handler.paths.primary_executable(version);
        fs::create_dir_all(exe.parent().unwrap()).unwrap();
        fs::write(exe, "#!/bin/sh\n").unwrap();
    }

    #[tokio::test]
    async fn test_local_then_current() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, HashMap::new());
        fake_install(&handler, "3.9.6");

        handler
            .handle_command(Commands::Local {
                version: Some("3.9.6".to_string()),
                unset: false,
            })
            .await
            .unwrap();
        let resolved = handler.resolver().resolve().unwrap();
        assert_eq!(resolved.source, VersionSource::Local);

        handler
            .handle_command(Commands::Local {
                version: None,
                unset: true,
            })
            .await
            .unwrap();
        assert!(!handler.cwd.join(".maven-version").exists());
    }

    #[tokio::test]
    async fn test_global_rejects_missing_version() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, HashMap::new());
        let err = handler
            .handle_command(Commands::Global {
                version: Some("3.9.6".to_string()),
                unset: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::VersionNotInstalled { .. }));
        assert!(err.user_message().contains("mvnenv install 3.9.6"));
    }

    #[tokio::test]
    async fn test_session_override_from_injected_env() {
        let dir = TempDir::new().unwrap();
        let handler = handler(
            &dir,
            HashMap::from([(env::SESSION_VERSION.to_string(), "3.8.8".to_string())]),
        );
        fake_install(&handler, "3.8.8");
        fake_install(&handler, "3.9.6");
        handler.config_store().set_default_version(Some("3.9.6")).unwrap();

        let resolved = handler.resolver().resolve().unwrap();
        assert_eq!(resolved.version, "3.8.8");
        assert_eq!(resolved.source, VersionSource::Shell);
    }

    #[tokio::test]
    async fn test_credential_for_unknown_repository() {
        let dir = TempDir::new().unwrap();
        let handler = handler(
            &dir,
            HashMap::from([("SECRET".to_string(), "s3cr3t".to_string())]),
        );
        let err = handler
            .handle_command(Commands::Credential {
                action: CredentialCommands::Set {
                    repository: "missing".to_string(),
                    username: "ci".to_string(),
                    secret_env: Some("SECRET".to_string()),
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(err.error, AppError::RepositoryNotFound { .. }));
    }

    #[tokio::test]
    async fn test_repo_add_and_list() {
        let dir = TempDir::new().unwrap();
        let handler = handler(&dir, HashMap::new());
        handler
            .handle_command(Commands::Repo {
                action: RepoCommands::Add {
                    name: "corp".to_string(),
                    url: "https://nexus.example.com/repository/maven-public".to_string(),
                    kind: RepoKind::Nexus,
                    priority: 1,
                    disabled: false,
                    auth: Some(AuthKind::Bearer),
                    username: None,
                    password: None,
                    token: Some("${CORP_TOKEN}".to_string()),
                    ca_cert: None,
                    insecure: false,
                },
            })
            .await
            .unwrap();

        let entries = RepositoryConfigStore::new(
            handler.paths.repositories_file(),
            EnvVarUtils::map_lookup(HashMap::new()),
        )
        .load_raw()
        .unwrap();
        let corp = entries.iter().find(|e| e.name == "corp").unwrap();
        assert_eq!(
            corp.auth,
            Some(AuthConfig::Bearer {
                token: Some("${CORP_TOKEN}".to_string())
            })
        );
        // 内置仓库保留
        assert!(entries.iter().any(|e| e.name == "central"));
    }
}
