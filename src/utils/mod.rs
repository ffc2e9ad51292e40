use bcrypt::{DEFAULT_COST, hash, verify};
use uuid::Uuid;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

/// 生成注册/重置账户时使用的确认令牌
pub fn generate_confirmation_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 解析旧格式的逗号分隔页面列表（如 "1,2"），去重并保持首次出现的顺序
pub fn parse_permitted_pages(raw: &str) -> Vec<i32> {
    let mut pages = Vec::new();
    for id in raw.split(',').filter_map(|s| s.trim().parse::<i32>().ok()) {
        if !pages.contains(&id) {
            pages.push(id);
        }
    }
    pages
}

pub fn format_permitted_pages(pages: &[i32]) -> String {
    pages
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("hunter22").unwrap();
        assert_ne!(hashed, "hunter22");
        assert!(verify_password("hunter22", &hashed).unwrap());
        assert!(!verify_password("hunter23", &hashed).unwrap());
    }

    #[test]
    fn confirmation_tokens_are_unique() {
        let a = generate_confirmation_token();
        let b = generate_confirmation_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn permitted_pages_parse_and_format() {
        assert_eq!(parse_permitted_pages("1,2"), vec![1, 2]);
        assert_eq!(parse_permitted_pages(" 3, 1 ,3,,x"), vec![3, 1]);
        assert!(parse_permitted_pages("").is_empty());
        assert_eq!(format_permitted_pages(&[1, 2, 5]), "1,2,5");
        assert_eq!(format_permitted_pages(&[]), "");
    }
}
