//! UI-related string formatting, like colorization and sizes.

use pdsfile::Depth;

/// 使用 ANSI 代码为字符串着色
pub fn colorize_string(s: &str, color: &str) -> String {
    let code = match color {
        "red" => "\x1b[31m",
        "green" => "\x1b[32m",
        "yellow" => "\x1b[33m",
        "blue" => "\x1b[34m",
        "magenta" => "\x1b[35m",
        "cyan" => "\x1b[36m",
        _ => return s.to_string(), // 未知颜色或无颜色
    };
    format!("{}{}\x1b[0m", code, s)
}

/// 每一层级使用的颜色
pub fn depth_color(depth: Depth) -> &'static str {
    match depth {
        Depth::Root => "magenta",
        Depth::Category => "cyan",
        Depth::Volset => "yellow",
        Depth::Volume => "green",
        Depth::Interior => "",
    }
}

/// 将字节数格式化为 "1.5 KiB" 这样的形式
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
