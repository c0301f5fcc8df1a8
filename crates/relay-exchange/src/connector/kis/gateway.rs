//! 시장별 클라이언트 분기.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{
    AccountBalance, BuyingPower, OpenOrder, OrderAck, OrderRequest, Position, Quote, Venue,
};
use rust_decimal::Decimal;

use super::cancel::CancelSweepReport;
use super::client_kr::KisKrClient;
use super::client_us::KisUsClient;
use super::envelope::KisTransport;
use crate::{Brokerage, ExchangeError, Fetched};

/// 국내/해외 클라이언트를 묶은 KIS 게이트웨이.
pub struct KisGateway {
    kr: KisKrClient,
    us: KisUsClient,
}

impl KisGateway {
    /// 공유 전송 계층으로 게이트웨이 생성.
    pub fn new(transport: Arc<KisTransport>) -> Self {
        Self {
            kr: KisKrClient::new(Arc::clone(&transport)),
            us: KisUsClient::new(transport),
        }
    }
}

#[async_trait]
impl Brokerage for KisGateway {
    async fn last_price(&self, venue: &Venue, symbol: &str) -> Fetched<Option<Decimal>> {
        match venue {
            Venue::Domestic => self.kr.last_price(symbol).await,
            Venue::Overseas(exchange) => self.us.last_price(*exchange, symbol).await,
        }
    }

    async fn quote(&self, venue: &Venue, symbol: &str) -> Fetched<Option<Quote>> {
        match venue {
            Venue::Domestic => self.kr.quote(symbol).await,
            Venue::Overseas(exchange) => self.us.quote(*exchange, symbol).await,
        }
    }

    async fn positions(&self, venue: &Venue) -> Fetched<Vec<Position>> {
        self.balance(venue).await.map(|balance| balance.positions)
    }

    async fn balance(&self, venue: &Venue) -> Fetched<AccountBalance> {
        match venue {
            Venue::Domestic => self.kr.balance().await,
            Venue::Overseas(exchange) => self.us.balance(*exchange).await,
        }
    }

    async fn buying_power(
        &self,
        venue: &Venue,
        symbol: &str,
        price: Decimal,
    ) -> Fetched<Option<BuyingPower>> {
        match venue {
            Venue::Domestic => self.kr.buying_power(symbol, price).await,
            Venue::Overseas(exchange) => self.us.buying_power(*exchange, symbol, price).await,
        }
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        match order.venue {
            Venue::Domestic => self.kr.submit_order(order).await,
            Venue::Overseas(exchange) => self.us.submit_order(exchange, order).await,
        }
    }

    async fn cancel_order(&self, venue: &Venue, order: &OpenOrder) -> Result<OrderAck, ExchangeError> {
        match venue {
            Venue::Domestic => self.kr.cancel_order(order).await,
            Venue::Overseas(_) => self.us.cancel_order(order).await,
        }
    }

    async fn open_orders(&self, venue: &Venue) -> Fetched<Vec<OpenOrder>> {
        match venue {
            Venue::Domestic => self.kr.open_orders().await,
            Venue::Overseas(exchange) => self.us.open_orders(*exchange).await,
        }
    }

    async fn cancel_all(&self, venue: &Venue, skip: &HashSet<String>) -> CancelSweepReport {
        match venue {
            Venue::Domestic => self.kr.cancel_all(skip).await,
            Venue::Overseas(exchange) => self.us.cancel_all(*exchange, skip).await,
        }
    }
}
