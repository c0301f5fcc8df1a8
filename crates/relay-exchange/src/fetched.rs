//! 실패를 흡수한 조회 결과.
//!
//! 조회 API는 실패 시 빈 값(빈 목록, `None`, 0)을 돌려주되,
//! 원인 에러를 함께 실어 보냅니다. 호출자는 "정말 0"과
//! "조회 실패"를 `error`로 구분할 수 있습니다.

use tracing::error;

use crate::error::ExchangeError;

/// 진단 정보가 붙은 조회 결과.
#[derive(Debug)]
pub struct Fetched<T> {
    /// 조회 값 (실패 시 빈 값)
    pub value: T,
    /// 실패 원인
    pub error: Option<ExchangeError>,
}

impl<T> Fetched<T> {
    /// 성공한 조회.
    pub fn ok(value: T) -> Self {
        Self { value, error: None }
    }

    /// 실패한 조회.
    pub fn failed(value: T, error: ExchangeError) -> Self {
        Self {
            value,
            error: Some(error),
        }
    }

    /// 조회가 실패했는지 확인.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// 실패 원인 메시지.
    pub fn diagnostic(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    /// 값과 에러로 분해.
    pub fn into_parts(self) -> (T, Option<ExchangeError>) {
        (self.value, self.error)
    }

    /// 값 변환 (에러는 유지).
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            error: self.error,
        }
    }
}

impl<T: Default> Fetched<T> {
    /// `Result`를 흡수합니다. 실패는 로그를 남기고 기본값으로 대체합니다.
    pub fn capture(result: Result<T, ExchangeError>, operation: &str) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => {
                error!(operation, error = %e, "KIS lookup failed, returning empty result");
                Self::failed(T::default(), e)
            }
        }
    }
}
