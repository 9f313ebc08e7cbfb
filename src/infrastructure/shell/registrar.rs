use super::platform::quote;
use crate::core::constants::env;
use crate::error::{AppError, AppResult};
use crate::utils::{FileSystemUtils, MvnenvPaths};
use handlebars::Handlebars;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

const ENV_SCRIPT_TEMPLATE: &str = r#"# mvnenv 环境配置（由 mvnenv setup 生成，请勿手动修改）
export {{root_var}}={{root}}
case ":${PATH}:" in
  *:{{shims}}:*) ;;
  *) export PATH={{shims}}":${PATH}" ;;
esac
"#;

/// 注册结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    pub script: PathBuf,
    pub profile: PathBuf,
    /// 本次是否向 profile 追加了加载语句
    pub profile_updated: bool,
}

/// 把 shims 目录注册到用户级 PATH 的能力
pub trait EnvironmentRegistrar {
    fn register(&self) -> AppResult<RegistrationOutcome>;

    fn is_registered(&self) -> AppResult<bool>;
}

/// 通过 `env.sh` + `~/.profile` 注册
pub struct ProfileRegistrar {
    paths: MvnenvPaths,
    profile: PathBuf,
}

impl ProfileRegistrar {
    pub fn new(paths: MvnenvPaths, profile: impl Into<PathBuf>) -> Self {
        Self {
            paths,
            profile: profile.into(),
        }
    }

    /// 使用当前用户的 `~/.profile`
    pub fn for_home(paths: MvnenvPaths) -> AppResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::invalid_config("无法确定用户主目录"))?;
        Ok(Self::new(paths, home.join(".profile")))
    }

    /// 渲染 env.sh 内容
    pub fn render_script(&self) -> AppResult<String> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        let data = json!({
            "root_var": env::ROOT,
            "root": quote(&self.paths.root().display().to_string()),
            "shims": quote(&self.paths.shims_dir().display().to_string()),
        });
        handlebars
            .render_template(ENV_SCRIPT_TEMPLATE, &data)
            .map_err(|e| AppError::invalid_config(format!("渲染 env.sh 失败: {e}")))
    }

    fn source_line(&self) -> String {
        let script = quote(&self.paths.env_script().display().to_string());
        format!("[ -f {script} ] && . {script}")
    }

    fn profile_contains(profile: &Path, line: &str) -> AppResult<bool> {
        Ok(FileSystemUtils::read_to_string_optional(profile)?
            .is_some_and(|content| content.lines().any(|l| l.trim() == line)))
    }
}

impl EnvironmentRegistrar for ProfileRegistrar {
    fn register(&self) -> AppResult<RegistrationOutcome> {
        let script = self.paths.env_script();
        FileSystemUtils::atomic_write(&script, self.render_script()?.as_bytes())?;

        let line = self.source_line();
        let profile_updated = if Self::profile_contains(&self.profile, &line)? {
            false
        } else {
            FileSystemUtils::append_to_string(&self.profile, &format!("\n# mvnenv\n{line}\n"))?;
            true
        };
        info!(script = %script.display(), profile = %self.profile.display(), profile_updated, "环境注册完成");

        Ok(RegistrationOutcome {
            script,
            profile: self.profile.clone(),
            profile_updated,
        })
    }

    fn is_registered(&self) -> AppResult<bool> {
        Ok(self.paths.env_script().is_file()
            && Self::profile_contains(&self.profile, &self.source_line())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_register_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let paths = MvnenvPaths::new(dir.path().join("root"));
        let profile = dir.path().join(".profile");
        fs::write(&profile, "export EDITOR=vi\n").unwrap();
        let registrar = ProfileRegistrar::new(paths.clone(), &profile);
        assert!(!registrar.is_registered().unwrap());

        let first = registrar.register().unwrap();
        assert!(first.profile_updated);
        let second = registrar.register().unwrap();
        assert!(!second.profile_updated);
        assert!(registrar.is_registered().unwrap());

        let content = fs::read_to_string(&profile).unwrap();
        assert!(content.starts_with("export EDITOR=vi\n"));
        assert_eq!(content.matches("env.sh").count(), 2);
    }

    #[test]
    fn test_env_script_prepends_shims_once() {
        let dir = TempDir::new().unwrap();
        let paths = MvnenvPaths::new("/home/u/.mvnenv");
        let registrar = ProfileRegistrar::new(paths, dir.path().join(".profile"));
        let script = registrar.render_script().unwrap();
        assert!(script.contains("export MVNENV_ROOT='/home/u/.mvnenv'"));
        assert!(script.contains("*:'/home/u/.mvnenv/shims':*) ;;"));
        assert!(script.contains(r#"export PATH='/home/u/.mvnenv/shims'":${PATH}""#));
    }
}
