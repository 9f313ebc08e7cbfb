//! 应用程序常量定义
//!
//! 本模块包含全局使用的常量，避免魔数并提供统一的配置值。

/// 网络相关常量
pub mod network {
    /// 单个仓库的版本发现超时（秒）
    pub const DEFAULT_REPOSITORY_TIMEOUT_SECS: u64 = 30;
    /// 默认连接超时时间（秒）
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
    /// 首次尝试之后的重试次数
    pub const MAX_RETRY_ATTEMPTS: u32 = 3;
    /// 指数退避的基础间隔（毫秒）
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    /// HTTP User-Agent
    pub const USER_AGENT: &str = concat!("mvnenv/", env!("CARGO_PKG_VERSION"));
}

/// 缓存相关常量
pub mod cache {
    /// 版本元数据缓存TTL（小时）
    pub const DEFAULT_TTL_HOURS: u64 = 24;
    /// 缓存文件名
    pub const METADATA_FILE: &str = "metadata.json";
}

/// 文件系统布局
pub mod layout {
    /// 默认根目录名（位于用户主目录下）
    pub const ROOT_DIR_NAME: &str = ".mvnenv";
    pub const VERSIONS_DIR: &str = "versions";
    pub const SHIMS_DIR: &str = "shims";
    pub const CACHE_DIR: &str = "cache";
    pub const LOCKS_DIR: &str = "locks";
    pub const CONFIG_FILE: &str = "config.toml";
    pub const REPOSITORIES_FILE: &str = "repositories.toml";
    pub const ENV_SCRIPT: &str = "env.sh";
    /// 项目级版本标记文件
    pub const MARKER_FILE: &str = ".maven-version";
    /// 版本目录内主可执行文件的相对路径
    pub const PRIMARY_EXECUTABLE: &str = "bin/mvn";
    /// 版本目录内可执行文件目录
    pub const BIN_DIR: &str = "bin";
}

/// 环境变量相关常量
pub mod env {
    /// 根目录覆盖
    pub const ROOT: &str = "MVNENV_ROOT";
    /// 会话级版本覆盖
    pub const SESSION_VERSION: &str = "MVNENV_MAVEN_VERSION";
    /// 诊断输出开关
    pub const DEBUG: &str = "MVNENV_DEBUG";
    /// 日志过滤
    pub const LOG: &str = "MVNENV_LOG";
    /// 注入子进程的工具主目录变量
    pub const TOOL_HOME: &str = "MAVEN_HOME";
}

/// 代理命令相关常量
pub mod shim {
    /// 始终生成的核心命令
    pub const CORE_COMMANDS: &[&str] = &["mvn", "mvnDebug", "mvnyjp"];
    /// 可执行文件权限
    pub const EXECUTABLE_MODE: u32 = 0o755;
    /// 无法解析版本或启动子进程时的退出码
    pub const FAILURE_EXIT_CODE: i32 = 1;
    /// 子进程被信号终止时的退出码基数
    pub const SIGNAL_EXIT_BASE: i32 = 128;
}

/// 仓库相关常量
pub mod repository {
    /// Maven 发行包在 Maven 仓库布局中的坐标路径
    pub const MAVEN_ARTIFACT_PATH: &str = "org/apache/maven/apache-maven";
    /// Maven Central
    pub const CENTRAL_URL: &str = "https://repo.maven.apache.org/maven2";
    pub const CENTRAL_NAME: &str = "central";
    pub const CENTRAL_PRIORITY: i32 = 10;
    /// Apache 归档站点
    pub const ARCHIVE_URL: &str = "https://archive.apache.org/dist/maven/maven-3";
    pub const ARCHIVE_NAME: &str = "apache-archive";
    pub const ARCHIVE_PRIORITY: i32 = 100;
    /// 凭据在安全存储中的命名空间
    pub const CREDENTIAL_NAMESPACE: &str = "mvnenv:repository";
}

/// 日志相关常量
pub mod log {
    /// 默认日志过滤级别
    pub const DEFAULT_FILTER: &str = "warn";
}
