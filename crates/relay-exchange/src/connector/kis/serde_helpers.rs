//! KIS 응답 역직렬화 헬퍼.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// KIS 숫자 문자열을 `Decimal`로 변환.
///
/// KIS는 값이 없을 때 `""` 또는 `"-"`를 보내므로 0으로 처리합니다.
pub(crate) fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = String::deserialize(deserializer)?;
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return Ok(Decimal::ZERO);
    }
    trimmed
        .parse::<Decimal>()
        .map_err(|_| serde::de::Error::custom(format!("Invalid decimal: {}", s)))
}

/// 객체 하나 또는 배열로 오는 `output` 필드를 항상 `Vec`으로 받습니다.
///
/// 조회 결과가 없으면 KIS는 빈 객체나 빈 문자열을 돌려주기도 합니다.
pub(crate) fn deserialize_rows<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::String(s) if s.is_empty() => Ok(Vec::new()),
        serde_json::Value::Object(ref map) if map.is_empty() => Ok(Vec::new()),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
            .collect(),
        other => serde_json::from_value(other)
            .map(|row| vec![row])
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "deserialize_decimal")]
        value: Decimal,
    }

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default, deserialize_with = "deserialize_rows")]
        output: Vec<Row>,
    }

    #[test]
    fn test_deserialize_decimal() {
        let row: Row = serde_json::from_str(r#"{"value": "12345.67"}"#).unwrap();
        assert_eq!(row.value, dec!(12345.67));

        let row: Row = serde_json::from_str(r#"{"value": "-"}"#).unwrap();
        assert_eq!(row.value, Decimal::ZERO);

        assert!(serde_json::from_str::<Row>(r#"{"value": "abc"}"#).is_err());
    }

    #[test]
    fn test_deserialize_rows_shapes() {
        let many: Wrapper =
            serde_json::from_str(r#"{"output": [{"value": "1"}, {"value": "2"}]}"#).unwrap();
        assert_eq!(many.output.len(), 2);

        let one: Wrapper = serde_json::from_str(r#"{"output": {"value": "3"}}"#).unwrap();
        assert_eq!(one.output.len(), 1);

        let empty: Wrapper = serde_json::from_str(r#"{"output": {}}"#).unwrap();
        assert!(empty.output.is_empty());

        let missing: Wrapper = serde_json::from_str(r#"{}"#).unwrap();
        assert!(missing.output.is_empty());
    }
}
