//! 수량 결정 및 주문 파이프라인.
//!
//! 이 crate는 다음을 제공합니다:
//! - 최대 매수/매도 수량, 축소 수량 계산 (`QuantityResolver`)
//! - 시그널 → 호가 → 수량 → 주문 제출 → 결과 정규화 (`OrderPipeline`)
//! - 보유 종목 일괄 축소 (종목별 실패 격리)
//!
//! # 예제
//!
//! ```rust,ignore
//! use relay_execution::{OrderPipeline, PipelineConfig, SignalRequest};
//!
//! let pipeline = OrderPipeline::new(broker, PipelineConfig::default());
//! let result = pipeline.resolve_and_execute(signal).await?;
//! ```

pub mod pipeline;
pub mod resolver;

pub use pipeline::{
    ExecutionError, ExecutionResult, OrderPipeline, OutcomeStatus, PipelineConfig,
    PositionOutcome, ReductionReport, ReductionStatus, SignalRequest,
};
pub use resolver::{reduction_quantity, QuantityResolver};
