//! JID and message text helpers.

/// Longest text body sent in one message.
pub const MAX_TEXT_LEN: usize = 4096;

pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with("@g.us")
}

/// User part of a JID, without device suffix (`555:3@s.whatsapp.net` -> `555`).
pub fn jid_user(jid: &str) -> &str {
    let user = jid.split_once('@').map_or(jid, |(user, _)| user);
    user.split_once(':').map_or(user, |(user, _)| user)
}

/// Split `text` into chunks of at most `max_len` bytes, preferring line
/// breaks and never cutting a UTF-8 character.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // `max_len` is smaller than one character; take the whole character.
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        let cut = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..cut]);
        start = cut;
    }
    chunks
}
