use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// mvnenv CLI 应用程序
#[derive(Parser, Debug)]
#[command(name = "mvnenv")]
#[command(about = "Apache Maven 多版本管理工具", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 顶级命令
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 安装 Maven 版本
    Install {
        /// 版本号，例如 3.9.6
        version: String,
        /// 已安装时先卸载再重新安装
        #[arg(short, long)]
        force: bool,
    },
    /// 卸载 Maven 版本
    Uninstall {
        version: String,
    },
    /// 列出已安装的版本
    List {
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
    /// 列出仓库中可用的版本
    ListRemote {
        /// 忽略缓存重新查询所有仓库
        #[arg(long)]
        refresh: bool,
        /// 结果数量限制
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
    /// 显示当前生效的版本及其来源
    Current {
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
    /// 查看或设置全局默认版本
    Global {
        version: Option<String>,
        /// 清除全局默认版本
        #[arg(long, conflicts_with = "version")]
        unset: bool,
    },
    /// 查看或设置当前目录的项目版本（.maven-version）
    Local {
        version: Option<String>,
        /// 删除当前目录的 .maven-version
        #[arg(long, conflicts_with = "version")]
        unset: bool,
    },
    /// 输出设置会话版本的 shell 命令，配合 eval 使用
    Shell {
        version: Option<String>,
        /// 输出清除会话版本的命令
        #[arg(long, conflicts_with = "version")]
        unset: bool,
        /// Shell 类型 (bash, zsh, fish, sh)，默认根据 $SHELL 检测
        #[arg(short, long)]
        shell: Option<String>,
    },
    /// 重新生成代理可执行文件
    Rehash,
    /// 仓库管理
    Repo {
        #[command(subcommand)]
        action: RepoCommands,
    },
    /// 仓库凭据管理
    Credential {
        #[command(subcommand)]
        action: CredentialCommands,
    },
    /// 版本缓存管理
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
    /// 把 shims 目录注册到 PATH
    Setup,
}

/// 仓库类型
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepoKind {
    Nexus,
    Archive,
}

/// 认证方式
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthKind {
    Basic,
    Bearer,
}

/// 仓库管理命令
#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// 添加仓库
    Add {
        /// 仓库名称（字母、数字、`.`、`_`、`-`）
        name: String,
        /// 仓库地址
        url: String,
        /// 仓库类型
        #[arg(short = 't', long = "type", value_enum, default_value = "nexus")]
        kind: RepoKind,
        /// 优先级，数值越小越优先
        #[arg(short, long, default_value = "50")]
        priority: i32,
        /// 添加但不启用
        #[arg(long)]
        disabled: bool,
        /// 认证方式
        #[arg(long, value_enum)]
        auth: Option<AuthKind>,
        /// 用户名，可写作 ${VAR}
        #[arg(long)]
        username: Option<String>,
        /// 密码，建议写作 ${VAR} 或使用 mvnenv credential set
        #[arg(long)]
        password: Option<String>,
        /// Bearer token，建议写作 ${VAR}
        #[arg(long)]
        token: Option<String>,
        /// 额外信任的 CA 证书（PEM）
        #[arg(long)]
        ca_cert: Option<PathBuf>,
        /// 跳过 TLS 证书校验
        #[arg(long)]
        insecure: bool,
    },
    /// 删除仓库及其凭据
    Remove {
        name: String,
    },
    /// 列出仓库
    List {
        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
}

/// 凭据管理命令
#[derive(Subcommand, Debug)]
pub enum CredentialCommands {
    /// 保存仓库凭据到系统安全存储
    Set {
        repository: String,
        /// 用户名（Bearer 认证可留空）
        #[arg(short, long, default_value = "")]
        username: String,
        /// 从该环境变量读取密码或 token；未指定时从标准输入读取一行
        #[arg(long)]
        secret_env: Option<String>,
    },
    /// 删除仓库凭据
    Delete {
        repository: String,
    },
}

/// 缓存管理命令
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// 清除版本缓存
    Clear,
}
