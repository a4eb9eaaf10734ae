//! 字符引用解码
//!
//! 属性值在解析时解码，文本内容保持原样。命名引用使用完整的HTML5实体表，
//! 数字引用必须以分号结尾；无法识别或未结束的引用原样保留。

use quick_xml::escape::{resolve_html5_entity, unescape_with};

/// 引用名称的最大长度（不含 `&` 与 `;`），足以容纳最长的HTML5实体名
const MAX_REFERENCE_LEN: usize = 32;

/// 解码字符串中的字符引用
///
/// # 参数
/// * `s` - 原始属性值
///
/// # 返回值
/// * `String` - 解码后的字符串
///
/// # 示例
///
/// ```rust
/// use scrapforge::html::unescape;
///
/// assert_eq!(unescape("a &amp; b"), "a & b");
/// assert_eq!(unescape("caf&eacute; &hearts;"), "café ♥");
/// assert_eq!(unescape("&#x4E2D;&#25991;"), "中文");
/// assert_eq!(unescape("&unknown; &amp"), "&unknown; &amp");
/// ```
pub fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match decode_reference(candidate) {
            Some((decoded, consumed)) => {
                out.push_str(&decoded);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// 尝试解码以 `&` 开头的引用，返回解码结果和消耗的字节数
fn decode_reference(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix('&')?;
    let end = body.find(';')?;
    if end == 0 || end > MAX_REFERENCE_LEN {
        return None;
    }

    let name = &body[..end];
    let well_formed = match name.strip_prefix('#') {
        Some(number) => !number.is_empty() && number.chars().all(|c| c.is_ascii_alphanumeric()),
        None => name.chars().all(|c| c.is_ascii_alphanumeric()),
    };
    if !well_formed {
        return None;
    }

    let consumed = end + 2;
    let decoded = match name.strip_prefix("#X") {
        Some(hex) => unescape_with(&format!("&#x{};", hex), resolve_html5_entity)
            .ok()?
            .into_owned(),
        None => unescape_with(&s[..consumed], resolve_html5_entity)
            .ok()?
            .into_owned(),
    };
    Some((decoded, consumed))
}
