use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and navigate a PDS holdings archive", long_about = None)]
pub struct Cli {
    /// 归档配置文件
    #[arg(short, long, global = true, value_name = "FILE", default_value = "pdsfile.json")]
    pub config: PathBuf,

    /// 输出调试日志 (等同于 PDSFILE_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 以 JSON 格式输出结果
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: TopLevelCommands,
}

#[derive(Subcommand, Debug)]
pub enum TopLevelCommands {
    /// 解析任意形式的路径并显示节点信息
    Resolve {
        /// 绝对路径、逻辑路径、URL 或卷名
        path: String,

        /// 路径不存在时也显示解析结果
        #[arg(long)]
        allow_missing: bool,
    },
    /// 列出目录内容
    Ls {
        /// 要列出的路径 (默认为虚拟根目录)
        path: Option<String>,
    },
    /// 列出一个卷集或卷的所有版本
    Versions { path: String },
    /// 列出关联类别中的对应文件
    Assoc {
        path: String,

        /// 目标类别，例如 previews 或 calibrated
        #[arg(short, long)]
        target: String,

        /// 只使用第一条匹配的规则
        #[arg(long)]
        primary: bool,

        /// 同时列出尚不存在的路径
        #[arg(long)]
        allow_missing: bool,
    },
    /// 显示校验和文件路径以及要去掉的前缀
    ChecksumPath { path: String },
    /// 显示归档文件路径以及要去掉的前缀
    ArchivePath { path: String },
    /// 生成一个带时间戳的校验日志路径
    LogPath {
        path: String,

        /// 日志名中的标识，例如 md5
        #[arg(long, default_value = "")]
        id: String,

        /// 日志名末尾的任务名
        #[arg(long, default_value = "")]
        task: String,

        /// 日志根目录下的子目录
        #[arg(long, default_value = "validation")]
        dir: String,

        /// 按卷集而不是卷生成路径
        #[arg(long)]
        volset: bool,
    },
    /// 预加载所有磁盘的类别、卷集和卷
    Preload,
    /// 列出相邻的目录、文件或索引行
    Neighbors {
        path: String,

        /// 向前 (反向) 遍历
        #[arg(short, long)]
        reverse: bool,

        /// 最多显示的条数
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// 只包含匹配这些模式的文件名
        #[arg(long)]
        include: Vec<String>,

        /// 排除匹配这些模式的文件名
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// 重建一个卷的 info shelf
    BuildShelf { path: String },
    /// 进入交互式浏览模式
    Browse {
        /// 起始路径 (默认为虚拟根目录)
        path: Option<String>,
    },
}

// --- REPL (交互式) 命令定义 ---
#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "REPL commands")]
pub enum ReplCommand {
    /// 显示当前节点或其子节点的信息
    Info { name: Option<String> },
    /// 列出当前目录或其子目录
    Ls { name: Option<String> },
    /// 移动到子节点、`..` 或任意路径 (以 / 开头)
    Cd { target: String },
    /// 回到父目录
    Up,
    /// 移动到下一个相邻节点
    Next,
    /// 移动到上一个相邻节点
    Prev,
    /// 列出当前节点的所有版本
    Versions,
    /// 列出关联类别中的对应文件
    Assoc {
        target: String,

        #[arg(long)]
        primary: bool,
    },
    /// 退出交互式会话
    #[command(visible_alias = "quit")]
    Exit,
}
