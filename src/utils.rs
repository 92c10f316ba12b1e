use std::path::{Component, Path, PathBuf};

/// 업로드 파일명 최대 길이 (바이트 기준 아님, 문자 수)
const MAX_FILENAME_CHARS: usize = 120;

/// 저장소 키를 content root 아래의 상대 경로로 검증합니다.
/// - 절대 경로, 빈 키, `..` 컴포넌트는 거부합니다.
/// - 통과하면 root에 join할 수 있는 정규화된 상대 경로를 반환합니다.
pub fn validate_relative_key(key: &str) -> Result<PathBuf, String> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err("storage key is empty".to_string());
    }

    let path = Path::new(trimmed);
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(format!("storage key escapes content root: {}", key));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(format!("storage key must be relative: {}", key));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(format!("storage key has no file component: {}", key));
    }
    Ok(normalized)
}

/// 원본 파일명을 저장소 키에 쓸 수 있는 형태로 정리합니다.
/// - 디렉토리 부분은 버리고, 영숫자/`.`/`-`/`_` 외 문자는 `_`로 치환합니다.
pub fn sanitize_filename(original: &str) -> String {
    // 브라우저에 따라 전체 경로가 올 수 있음 (C:\fakepath\...)
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original)
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = if cleaned.chars().count() > MAX_FILENAME_CHARS {
        // 확장자는 보존
        match cleaned.rsplit_once('.') {
            Some((stem, ext)) if ext.len() <= 8 => {
                let keep = MAX_FILENAME_CHARS.saturating_sub(ext.len() + 1);
                format!("{}.{}", stem.chars().take(keep).collect::<String>(), ext)
            }
            _ => cleaned.chars().take(MAX_FILENAME_CHARS).collect(),
        }
    } else {
        cleaned.to_string()
    };

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// 소문자 확장자 (없으면 빈 문자열)
pub fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}
