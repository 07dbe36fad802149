//! 方块 ID 分词
//!
//! 先按 `_`、`-` 和空白切分，再在大小写与数字边界上切分，全部转小写，
//! 最后经同义词表归一，让两套命名体系的词汇可以对上。

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// 旧版数字 ID 统一使用的单个词元
pub const LEGACY_TOKEN: &str = "legacy";

const LEGACY_PREFIX: &str = "legacy:";

static SYNONYMS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("log", &["trunk"][..]),
        ("planks", &["planks"][..]),
        ("slab", &["half"][..]),
        ("stairs", &["stairs"][..]),
        ("wall", &["wall"][..]),
        ("fence", &["fence"][..]),
        ("gate", &["gate"][..]),
        ("leaves", &["leaves"][..]),
        ("glass", &["glass"][..]),
        ("wool", &["wool"][..]),
        ("sand", &["sand"][..]),
        ("gravel", &["gravel"][..]),
        ("stone", &["stone"][..]),
        ("cobblestone", &["stone", "cobble"][..]),
        ("brick", &["brick"][..]),
        ("bricks", &["brick"][..]),
        ("mossy", &["mossy"][..]),
    ])
});

fn is_delimiter(c: char) -> bool {
    c == '_' || c == '-' || c.is_ascii_whitespace()
}

/// 切分标识符为小写词元
///
/// ```
/// use regionmap::tokens::tokenize;
/// assert_eq!(tokenize("Wood_Oak_Planks"), ["wood", "oak", "planks"]);
/// assert_eq!(tokenize("HTMLParser2"), ["html", "parser", "2"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for part in text.split(is_delimiter).filter(|p| !p.is_empty()) {
        split_case_boundaries(part, &mut tokens);
    }
    tokens
}

/// 在大小写与数字边界上切分一个片段
///
/// 大写字母后接小写时开始新词元；连续大写且后面不是小写时为一个词元；
/// 连续数字为一个词元；其他字符丢弃。
fn split_case_boundaries(part: &str, tokens: &mut Vec<String>) {
    let chars: Vec<char> = part.chars().collect();
    let run_end = |start: usize, pred: fn(&char) -> bool| {
        start + chars[start..].iter().take_while(|c| pred(c)).count()
    };

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            let end = run_end(i, char::is_ascii_digit);
            push_token(tokens, &chars[i..end]);
            i = end;
        } else if c.is_ascii_lowercase() {
            let end = run_end(i, char::is_ascii_lowercase);
            push_token(tokens, &chars[i..end]);
            i = end;
        } else if c.is_ascii_uppercase() {
            let upper_end = run_end(i, char::is_ascii_uppercase);
            let followed_by_lower = chars.get(upper_end).is_some_and(char::is_ascii_lowercase);
            if !followed_by_lower {
                push_token(tokens, &chars[i..upper_end]);
                i = upper_end;
                continue;
            }
            // 最后一个大写字母归入后面的小写词元
            let word_start = upper_end - 1;
            if word_start > i {
                push_token(tokens, &chars[i..word_start]);
            }
            let end = run_end(upper_end, char::is_ascii_lowercase);
            push_token(tokens, &chars[word_start..end]);
            i = end;
        } else {
            i += 1;
        }
    }
}

fn push_token(tokens: &mut Vec<String>, chars: &[char]) {
    tokens.push(chars.iter().collect::<String>().to_ascii_lowercase());
}

/// 按同义词表展开词元，未登记的词元原样保留
pub fn normalize_tokens(tokens: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(tokens.len());
    for token in tokens {
        match SYNONYMS.get(token.as_str()) {
            Some(replacement) => expanded.extend(replacement.iter().map(|t| t.to_string())),
            None => expanded.push(token),
        }
    }
    expanded
}

fn local_name(block_id: &str) -> &str {
    block_id
        .split_once(':')
        .map_or(block_id, |(_, name)| name)
}

/// 源方块（Minecraft）的词元
///
/// `legacy:` 开头的 ID 只产生一个 [`LEGACY_TOKEN`]；以 `_wood` 结尾的名称额外带上 `trunk`。
pub fn source_tokens(block_id: &str) -> Vec<String> {
    if block_id.starts_with(LEGACY_PREFIX) {
        return vec![LEGACY_TOKEN.to_string()];
    }
    let name = local_name(block_id);
    let mut tokens = normalize_tokens(tokenize(name));
    if name.ends_with("_wood") {
        tokens.push("trunk".to_string());
    }
    tokens
}

/// 目标方块的词元
pub fn destination_tokens(block_id: &str) -> Vec<String> {
    normalize_tokens(tokenize(local_name(block_id)))
}
