// ============================================================================
// Hub Operation Catalog
// ============================================================================
//
// Request/response shapes of the backend operations exposed through the
// gateway:
// - auth.AuthService: Login, ValidateToken
// - hub_investments.OrderService: SubmitOrder, GetOrderDetails,
//   GetOrderStatus, CancelOrder
// - hub_investments.PositionService: GetPositions, GetPositionAggregation
// - hub_investments.MarketDataService: GetMarketData
//
// All wire fields are camelCase. Every response may carry an `apiResponse`
// status envelope.
//
// ============================================================================

use super::operations::{Operation, OperationInput, OperationRegistry};
use hub_error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};

const AUTH_SERVICE: &str = "auth.AuthService";
const ORDER_SERVICE: &str = "hub_investments.OrderService";
const POSITION_SERVICE: &str = "hub_investments.PositionService";
const MARKET_DATA_SERVICE: &str = "hub_investments.MarketDataService";

/// Registry with every operation in this catalog
pub fn hub_operations() -> OperationRegistry {
    let mut registry = OperationRegistry::new();
    registry
        .register::<Login>()
        .register::<ValidateToken>()
        .register::<SubmitOrder>()
        .register::<GetOrderDetails>()
        .register::<GetOrderStatus>()
        .register::<CancelOrder>()
        .register::<GetPositions>()
        .register::<GetPositionAggregation>()
        .register::<GetMarketData>();
    registry
}

/// Generic success/status wrapper
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub email: String,
}

fn non_empty(value: &str, field: &str) -> GatewayResult<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::invalid_request(format!("{} is required", field)));
    }
    Ok(())
}

// ============================================================================
// auth.AuthService
// ============================================================================

pub struct Login;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

impl Operation for Login {
    const SERVICE: &'static str = AUTH_SERVICE;
    const METHOD: &'static str = "Login";
    type Request = LoginRequest;
    type Response = LoginResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<LoginRequest> {
        let request: LoginRequest = input.json_body()?;
        non_empty(&request.email, "email")?;
        non_empty(&request.password, "password")?;
        Ok(request)
    }
}

pub struct ValidateToken;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
}

impl Operation for ValidateToken {
    const SERVICE: &'static str = AUTH_SERVICE;
    const METHOD: &'static str = "ValidateToken";
    type Request = ValidateTokenRequest;
    type Response = ValidateTokenResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<ValidateTokenRequest> {
        let request: ValidateTokenRequest = input.json_body()?;
        non_empty(&request.token, "token")?;
        Ok(request)
    }
}

// ============================================================================
// hub_investments.OrderService
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub order_side: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_price: Option<f64>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// `{userId, orderId}` request shared by the per-order operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLookup {
    pub user_id: String,
    pub order_id: String,
}

impl OrderLookup {
    fn from_input(input: &OperationInput<'_>) -> GatewayResult<Self> {
        let user = input.require_user()?;
        let order_id = input.require_path_var(&["id", "orderId", "order_id"])?;
        Ok(Self {
            user_id: user.user_id.clone(),
            order_id: order_id.to_string(),
        })
    }
}

pub struct SubmitOrder;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitOrderBody {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    order_side: String,
    #[serde(default)]
    order_type: String,
    #[serde(default)]
    quantity: f64,
    #[serde(default)]
    price: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub user_id: String,
    pub symbol: String,
    pub order_side: String,
    pub order_type: String,
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status: String,
}

impl Operation for SubmitOrder {
    const SERVICE: &'static str = ORDER_SERVICE;
    const METHOD: &'static str = "SubmitOrder";
    type Request = SubmitOrderRequest;
    type Response = SubmitOrderResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<SubmitOrderRequest> {
        let user = input.require_user()?;
        let body: SubmitOrderBody = input.json_body()?;

        non_empty(&body.symbol, "symbol")?;
        non_empty(&body.order_side, "orderSide")?;
        non_empty(&body.order_type, "orderType")?;
        if body.quantity.is_nan() || body.quantity <= 0.0 {
            return Err(GatewayError::invalid_request("quantity must be positive"));
        }
        if matches!(body.price, Some(price) if price <= 0.0) {
            return Err(GatewayError::invalid_request("price must be positive"));
        }

        Ok(SubmitOrderRequest {
            user_id: user.user_id.clone(),
            symbol: body.symbol.trim().to_ascii_uppercase(),
            order_side: body.order_side.trim().to_ascii_uppercase(),
            order_type: body.order_type.trim().to_ascii_uppercase(),
            quantity: body.quantity,
            price: body.price,
        })
    }
}

pub struct GetOrderDetails;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOrderDetailsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderDetails>,
}

impl Operation for GetOrderDetails {
    const SERVICE: &'static str = ORDER_SERVICE;
    const METHOD: &'static str = "GetOrderDetails";
    type Request = OrderLookup;
    type Response = GetOrderDetailsResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<OrderLookup> {
        OrderLookup::from_input(input)
    }
}

pub struct GetOrderStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetOrderStatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
}

impl Operation for GetOrderStatus {
    const SERVICE: &'static str = ORDER_SERVICE;
    const METHOD: &'static str = "GetOrderStatus";
    type Request = OrderLookup;
    type Response = GetOrderStatusResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<OrderLookup> {
        OrderLookup::from_input(input)
    }
}

pub struct CancelOrder;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status: String,
}

impl Operation for CancelOrder {
    const SERVICE: &'static str = ORDER_SERVICE;
    const METHOD: &'static str = "CancelOrder";
    type Request = OrderLookup;
    type Response = CancelOrderResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<OrderLookup> {
        OrderLookup::from_input(input)
    }
}

// ============================================================================
// hub_investments.PositionService
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScope {
    pub user_id: String,
}

impl UserScope {
    fn from_input(input: &OperationInput<'_>) -> GatewayResult<Self> {
        Ok(Self {
            user_id: input.require_user()?.user_id.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub position_id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub average_price: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub market_value: f64,
    #[serde(default)]
    pub unrealized_pnl: f64,
    #[serde(default)]
    pub unrealized_pnl_percentage: f64,
}

pub struct GetPositions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPositionsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

impl Operation for GetPositions {
    const SERVICE: &'static str = POSITION_SERVICE;
    const METHOD: &'static str = "GetPositions";
    type Request = UserScope;
    type Response = GetPositionsResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<UserScope> {
        UserScope::from_input(input)
    }
}

pub struct GetPositionAggregation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAggregation {
    #[serde(default)]
    pub total_market_value: f64,
    #[serde(default)]
    pub total_invested: f64,
    #[serde(default)]
    pub total_pnl: f64,
    #[serde(default)]
    pub total_pnl_percentage: f64,
    #[serde(default)]
    pub position_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPositionAggregationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<PositionAggregation>,
}

impl Operation for GetPositionAggregation {
    const SERVICE: &'static str = POSITION_SERVICE;
    const METHOD: &'static str = "GetPositionAggregation";
    type Request = UserScope;
    type Response = GetPositionAggregationResponse;

    fn build_request(input: &OperationInput<'_>) -> GatewayResult<UserScope> {
        UserScope::from_input(input)
    }
}

// ============================================================================
// hub_investments.MarketDataService
// ============================================================================

pub struct GetMarketData;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMarketDataRequest {
    #[serde(default)]
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub last_quote: f64,
    #[serde(default)]
    pub category: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMarketDataResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<ApiResponse>,
    #[serde(default)]
    pub market_data: Vec<MarketQuote>,
}

impl Operation for GetMarketData {
    const SERVICE: &'static str = MARKET_DATA_SERVICE;
    const METHOD: &'static str = "GetMarketData";
    type Request = GetMarketDataRequest;
    type Response = GetMarketDataResponse;

    /// `/market-data/{symbol}` or a `{"symbols": [...]}` body
    fn build_request(input: &OperationInput<'_>) -> GatewayResult<GetMarketDataRequest> {
        let mut request: GetMarketDataRequest = match input.path_var(&["symbol"]) {
            Some(symbol) => GetMarketDataRequest {
                symbols: vec![symbol.to_string()],
            },
            None => input.json_body()?,
        };

        request.symbols = request
            .symbols
            .iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        if request.symbols.is_empty() {
            return Err(GatewayError::invalid_request("at least one symbol is required"));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserContext;
    use crate::gateway::OperationId;
    use std::collections::HashMap;

    fn user() -> UserContext {
        UserContext {
            user_id: "user-1".to_string(),
            email: "trader@hub.test".to_string(),
        }
    }

    #[test]
    fn test_catalog_registers_every_operation() {
        let registry = hub_operations();

        assert_eq!(registry.len(), 9);
        assert!(registry.contains(&OperationId::new("auth.AuthService", "Login")));
        assert!(registry.contains(&OperationId::new(
            "hub_investments.OrderService",
            "GetOrderDetails"
        )));
        assert!(registry.contains(&OperationId::new(
            "hub_investments.MarketDataService",
            "GetMarketData"
        )));
    }

    #[test]
    fn test_login_requires_credentials() {
        let vars = HashMap::new();
        let input = OperationInput {
            body: br#"{"email":"trader@hub.test","password":""}"#,
            path_vars: &vars,
            user: None,
        };

        let err = Login::build_request(&input).err().unwrap();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_order_lookup_uses_path_and_user() {
        let vars = HashMap::from([("id".to_string(), "42".to_string())]);
        let user = user();
        let input = OperationInput {
            body: b"",
            path_vars: &vars,
            user: Some(&user),
        };

        let request = GetOrderDetails::build_request(&input).unwrap();
        assert_eq!(
            request,
            OrderLookup {
                user_id: "user-1".to_string(),
                order_id: "42".to_string()
            }
        );
    }

    #[test]
    fn test_submit_order_validation() {
        let vars = HashMap::new();
        let user = user();
        let input = |body: &'static [u8]| OperationInput {
            body,
            path_vars: &vars,
            user: Some(&user),
        };

        let request = SubmitOrder::build_request(&input(
            br#"{"symbol":"aapl","orderSide":"buy","orderType":"market","quantity":10}"#,
        ))
        .unwrap();
        assert_eq!(request.symbol, "AAPL");
        assert_eq!(request.user_id, "user-1");

        let err = SubmitOrder::build_request(&input(
            br#"{"symbol":"AAPL","orderSide":"BUY","orderType":"MARKET","quantity":0}"#,
        ))
        .err()
        .unwrap();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn test_market_data_from_path_or_body() {
        let vars = HashMap::from([("symbol".to_string(), "petr4".to_string())]);
        let input = OperationInput {
            body: b"",
            path_vars: &vars,
            user: None,
        };
        assert_eq!(GetMarketData::build_request(&input).unwrap().symbols, vec!["PETR4"]);

        let empty = HashMap::new();
        let input = OperationInput {
            body: br#"{"symbols":["vale3"," "]}"#,
            path_vars: &empty,
            user: None,
        };
        assert_eq!(GetMarketData::build_request(&input).unwrap().symbols, vec!["VALE3"]);
    }

    #[test]
    fn test_response_decoding_drops_unknown_fields() {
        let registry = hub_operations();
        let codec = registry.get(&GetOrderStatus::id()).unwrap();

        let value = codec
            .decode_response(br#"{"orderId":"42","status":"FILLED","internalShard":7}"#)
            .unwrap();

        assert_eq!(value["status"], "FILLED");
        assert!(value.get("internalShard").is_none());
    }
}
