use crate::utils::EnvLookup;

/// Shell 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    /// 其它 POSIX shell（sh、dash 等）
    Posix,
}

impl ShellType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bash" => Some(ShellType::Bash),
            "zsh" => Some(ShellType::Zsh),
            "fish" => Some(ShellType::Fish),
            "sh" | "dash" | "ksh" | "posix" => Some(ShellType::Posix),
            _ => None,
        }
    }
}

/// 根据 `$SHELL` 检测当前 shell，无法识别时按 POSIX shell 处理
pub fn detect_shell(lookup: &EnvLookup) -> ShellType {
    let Some(shell) = lookup("SHELL") else {
        return ShellType::Posix;
    };
    let name = shell.rsplit('/').next().unwrap_or_default();
    ShellType::from_name(name).unwrap_or(ShellType::Posix)
}

/// 生成设置环境变量的命令
pub fn export_command(key: &str, value: &str, shell: ShellType) -> String {
    match shell {
        ShellType::Fish => format!("set -gx {key} {}", quote(value)),
        _ => format!("export {key}={}", quote(value)),
    }
}

/// 生成清除环境变量的命令
pub fn unset_command(key: &str, shell: ShellType) -> String {
    match shell {
        ShellType::Fish => format!("set -e {key}"),
        _ => format!("unset {key}"),
    }
}

/// 单引号包裹，内部的单引号写作 `'\''`
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
