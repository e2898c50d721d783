//! Friendly task names accepted by `start`, mapped to MAA task codes.

pub const LINK_START_TASK_TYPE: &str = "LinkStart";

const TASK_ALIASES: &[(&str, &str)] = &[
    ("base", "LinkStart-Base"),
    ("wakeup", "LinkStart-WakeUp"),
    ("combat", "LinkStart-Combat"),
    ("recruiting", "LinkStart-Recruiting"),
    ("mall", "LinkStart-Mall"),
    ("mission", "LinkStart-Mission"),
    ("autoroguelike", "LinkStart-AutoRoguelike"),
    ("reclamation", "LinkStart-Reclamation"),
    ("基建换班", "LinkStart-Base"),
    ("基建", "LinkStart-Base"),
    ("开始唤醒", "LinkStart-WakeUp"),
    ("刷理智", "LinkStart-Combat"),
    ("自动公招", "LinkStart-Recruiting"),
    ("公招", "LinkStart-Recruiting"),
    ("获取信用及购物", "LinkStart-Mall"),
    ("信用", "LinkStart-Mall"),
    ("领取奖励", "LinkStart-Mission"),
    ("自动肉鸽", "LinkStart-AutoRoguelike"),
    ("肉鸽", "LinkStart-AutoRoguelike"),
    ("生息演算", "LinkStart-Reclamation"),
    ("all", LINK_START_TASK_TYPE),
];

fn lookup_alias(key: &str) -> Option<&'static str> {
    TASK_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, task_type)| *task_type)
}

/// Resolves a task name; ASCII names match case-insensitively, others exactly.
pub fn resolve_task_alias(name: &str) -> Option<&'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    lookup_alias(trimmed.to_ascii_lowercase().as_str()).or_else(|| lookup_alias(trimmed))
}

pub fn render_available_tasks() -> String {
    [
        "  ALL - full daily routine",
        "  Base/基建换班/基建",
        "  WakeUp/开始唤醒",
        "  Combat/刷理智",
        "  Recruiting/自动公招/公招",
        "  Mall/获取信用及购物/信用",
        "  Mission/领取奖励",
        "  AutoRoguelike/自动肉鸽/肉鸽",
        "  Reclamation/生息演算",
    ]
    .join("\n")
}
