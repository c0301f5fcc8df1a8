//! 요청 봉투와 응답 분류기.
//!
//! 모든 KIS 호출은 [`KisTransport::execute`]를 거칩니다:
//! 토큰 획득 → (서명 필요 시) 해시키 발급 → 공통 헤더 → 전송 → 분류.
//!
//! 분류 규칙:
//! - 응답 없음, 타임아웃, 2xx가 아닌 상태, JSON 파싱 실패 → 전송 에러 (`Err`)
//! - 2xx + JSON → [`ResponseEnvelope`]. `rt_cd == "0"`일 때만 `is_ok()`

use std::collections::BTreeMap;
use std::sync::Arc;

use relay_core::OrderAck;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::auth::KisOAuth;
use super::config::{KisConfig, KisEnvironment};
use crate::ExchangeError;

/// HTTP 메서드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    /// 조회 (파라미터는 쿼리 문자열)
    Get,
    /// 주문 등 (파라미터는 JSON 본문)
    Post,
}

/// 호출 하나를 기술하는 요청 봉투. 호출마다 새로 만듭니다.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// 대상 경로 (예: `/uapi/overseas-stock/v1/trading/order`)
    pub path: String,
    /// 거래 ID
    pub tr_id: String,
    /// 파라미터 (입력 순서 유지 안 함)
    pub params: Map<String, Value>,
    /// HTTP 메서드
    pub verb: HttpVerb,
    /// 해시키 서명 필요 여부
    pub signed: bool,
}

impl RequestEnvelope {
    /// GET 요청 생성.
    pub fn get(path: impl Into<String>, tr_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            tr_id: tr_id.into(),
            params: Map::new(),
            verb: HttpVerb::Get,
            signed: false,
        }
    }

    /// POST 요청 생성.
    pub fn post(path: impl Into<String>, tr_id: impl Into<String>) -> Self {
        Self {
            verb: HttpVerb::Post,
            ..Self::get(path, tr_id)
        }
    }

    /// 파라미터 추가.
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), Value::String(value.into()));
        self
    }

    /// 해시키 서명 요청.
    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// 쿼리 문자열 쌍.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// JSON 본문 문자열.
    pub fn body_string(&self) -> Result<String, ExchangeError> {
        Ok(serde_json::to_string(&self.params)?)
    }
}

/// 분류된 응답.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// HTTP 상태 코드
    pub status: u16,
    /// 응답 헤더 (소문자 키)
    pub headers: BTreeMap<String, String>,
    /// 파싱된 본문
    pub body: Value,
    /// 도메인 결과 코드 ("0" = 성공)
    pub rt_cd: String,
    /// 도메인 메시지 코드
    pub msg_cd: String,
    /// 도메인 메시지
    pub msg1: String,
}

impl ResponseEnvelope {
    /// 상태 코드와 본문으로 응답 봉투 생성.
    ///
    /// # Errors
    /// 본문에 `rt_cd`가 없으면 `ParseError`를 반환합니다.
    pub fn from_parts(
        status: u16,
        headers: BTreeMap<String, String>,
        body: Value,
    ) -> Result<Self, ExchangeError> {
        let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);

        let rt_cd = field("rt_cd")
            .ok_or_else(|| ExchangeError::ParseError("응답에 rt_cd가 없습니다".to_string()))?;
        let msg_cd = field("msg_cd").unwrap_or_default();
        let msg1 = field("msg1").unwrap_or_default().trim().to_string();

        Ok(Self {
            status,
            headers,
            body,
            rt_cd,
            msg_cd,
            msg1,
        })
    }

    /// 성공 여부 (2xx이고 `rt_cd == "0"`).
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status) && self.rt_cd == "0"
    }

    /// 본문을 타입으로 디코딩.
    ///
    /// # Errors
    /// 구조가 맞지 않으면 `ParseError`를 반환합니다.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ExchangeError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ExchangeError::ParseError(format!("응답 디코딩 실패: {}", e)))
    }

    /// 도메인 실패를 `ApiError`로 변환.
    pub fn into_result(self) -> Result<Self, ExchangeError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(ExchangeError::ApiError {
                rt_cd: self.rt_cd,
                msg_cd: self.msg_cd,
                message: self.msg1,
            })
        }
    }

    /// 주문/취소 응답을 접수 결과로 변환.
    ///
    /// # Errors
    /// 도메인 실패는 `ApiError`, `output` 구조가 다르면 `ParseError`.
    pub fn into_order_ack(self) -> Result<OrderAck, ExchangeError> {
        #[derive(Deserialize)]
        struct OrderOutput {
            #[serde(rename = "KRX_FWDG_ORD_ORGNO", default)]
            branch: String,
            #[serde(rename = "ODNO", default)]
            order_no: String,
            #[serde(rename = "ORD_TMD", default)]
            order_time: String,
        }

        #[derive(Deserialize)]
        struct OrderResponse {
            output: OrderOutput,
        }

        let envelope = self.into_result()?;
        let resp: OrderResponse = envelope.decode()?;

        Ok(OrderAck {
            rt_cd: envelope.rt_cd,
            msg_cd: envelope.msg_cd,
            msg1: envelope.msg1,
            order_no: resp.output.order_no,
            order_time: resp.output.order_time,
            branch: resp.output.branch,
        })
    }

    /// 응답 헤더 값 조회.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// KIS HTTP 전송 계층.
///
/// 세션 관리자를 생성자로 주입받아 국내/해외 클라이언트가 공유합니다.
pub struct KisTransport {
    oauth: Arc<KisOAuth>,
    client: Client,
}

impl KisTransport {
    /// 새로운 전송 계층 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(oauth: Arc<KisOAuth>) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(oauth.config().timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self { oauth, client })
    }

    /// 세션 관리자 참조.
    pub fn oauth(&self) -> &Arc<KisOAuth> {
        &self.oauth
    }

    /// 설정 참조.
    pub fn config(&self) -> &KisConfig {
        self.oauth.config()
    }

    /// 환경에 따른 적절한 tr_id 반환.
    pub fn tr_id<'a>(&self, real_id: &'a str, paper_id: &'a str) -> &'a str {
        match self.config().environment {
            KisEnvironment::Real => real_id,
            KisEnvironment::Paper => paper_id,
        }
    }

    /// 요청 실행 및 응답 분류.
    ///
    /// # Errors
    /// 세션 에러, 해시키 실패, 전송 에러. 도메인 실패(`rt_cd != "0"`)는
    /// `Ok`로 돌아오며 `is_ok()`로 구분합니다.
    pub async fn execute(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, ExchangeError> {
        let token = self.oauth.get_token().await?;
        let url = format!("{}{}", self.config().rest_base_url(), envelope.path);

        let request = match envelope.verb {
            HttpVerb::Get => {
                let headers = self.oauth.build_headers(&token, &envelope.tr_id, None)?;
                self.client
                    .get(&url)
                    .headers(headers)
                    .query(&envelope.query_pairs())
            }
            HttpVerb::Post => {
                // 해시키와 본 요청이 같은 바이트를 쓰도록 한 번만 직렬화
                let body = envelope.body_string()?;
                let hashkey = if envelope.signed {
                    Some(self.oauth.hashkey(&token, &body).await?)
                } else {
                    None
                };
                let headers = self
                    .oauth
                    .build_headers(&token, &envelope.tr_id, hashkey.as_deref())?;
                self.client.post(&url).headers(headers).body(body)
            }
        };

        debug!(tr_id = %envelope.tr_id, path = %envelope.path, "KIS request");

        let response = request.send().await?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let text = response.text().await?;

        if !status.is_success() {
            error!(tr_id = %envelope.tr_id, status = %status, body = %text, "KIS request failed");
            return Err(ExchangeError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ExchangeError::ParseError(format!("JSON 파싱 실패: {}", e)))?;

        let envelope_out = ResponseEnvelope::from_parts(status.as_u16(), headers, body)?;
        if !envelope_out.is_ok() {
            debug!(
                tr_id = %envelope.tr_id,
                rt_cd = %envelope_out.rt_cd,
                msg_cd = %envelope_out.msg_cd,
                msg1 = %envelope_out.msg1,
                "KIS domain failure"
            );
        }

        Ok(envelope_out)
    }

    /// 실행 후 도메인 실패를 에러로 바꾸고 본문을 디코딩.
    pub async fn call<T: DeserializeOwned>(&self, envelope: &RequestEnvelope) -> Result<T, ExchangeError> {
        self.execute(envelope).await?.into_result()?.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(status: u16, body: Value) -> ResponseEnvelope {
        ResponseEnvelope::from_parts(status, BTreeMap::new(), body).unwrap()
    }

    #[test]
    fn test_is_ok_requires_success_code() {
        let ok = envelope(200, json!({"rt_cd": "0", "msg_cd": "MCA00000", "msg1": "정상처리 되었습니다."}));
        assert!(ok.is_ok());

        let rejected = envelope(200, json!({"rt_cd": "1", "msg_cd": "APBK0013", "msg1": "주문가능금액 부족 "}));
        assert!(!rejected.is_ok());
        assert_eq!(rejected.msg1, "주문가능금액 부족");
    }

    #[test]
    fn test_into_result_preserves_domain_fields() {
        let rejected = envelope(200, json!({"rt_cd": "7", "msg_cd": "EGW00201", "msg1": "초당 거래건수 초과"}));
        match rejected.into_result() {
            Err(ExchangeError::ApiError { rt_cd, msg_cd, message }) => {
                assert_eq!(rt_cd, "7");
                assert_eq!(msg_cd, "EGW00201");
                assert_eq!(message, "초당 거래건수 초과");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_rt_cd_is_parse_error() {
        let result = ResponseEnvelope::from_parts(200, BTreeMap::new(), json!({"output": {}}));
        assert!(matches!(result, Err(ExchangeError::ParseError(_))));
    }

    #[test]
    fn test_decode_failure_is_parse_error() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Typed {
            output: Vec<String>,
        }

        let env = envelope(200, json!({"rt_cd": "0", "output": {"not": "a list"}}));
        assert!(matches!(env.decode::<Typed>(), Err(ExchangeError::ParseError(_))));
    }

    #[test]
    fn test_into_order_ack() {
        let env = envelope(
            200,
            json!({
                "rt_cd": "0",
                "msg_cd": "APBK0013",
                "msg1": "주문 전송 완료 되었습니다.",
                "output": {"KRX_FWDG_ORD_ORGNO": "01790", "ODNO": "0000004336", "ORD_TMD": "160524"}
            }),
        );
        let ack = env.into_order_ack().unwrap();
        assert_eq!(ack.order_no, "0000004336");
        assert_eq!(ack.branch, "01790");
        assert_eq!(ack.order_time, "160524");
        assert_eq!(ack.rt_cd, "0");
    }

    #[test]
    fn test_request_builder() {
        let req = RequestEnvelope::post("/uapi/overseas-stock/v1/trading/order", "TTTT1002U")
            .param("PDNO", "AAPL")
            .param("ORD_QTY", "10")
            .signed();

        assert_eq!(req.verb, HttpVerb::Post);
        assert!(req.signed);
        let body: Value = serde_json::from_str(&req.body_string().unwrap()).unwrap();
        assert_eq!(body["PDNO"], "AAPL");
        assert_eq!(body["ORD_QTY"], "10");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = BTreeMap::new();
        headers.insert("tr_cont".to_string(), "M".to_string());
        let env = ResponseEnvelope::from_parts(200, headers, json!({"rt_cd": "0"})).unwrap();
        assert_eq!(env.header("TR_CONT"), Some("M"));
    }
}
