use std::fmt;

use serde::{Serialize, Serializer};

// クライアントに返却するエラーコード
// 数値はプロトコルの一部なので変更しないこと
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Input
    BadRoute,
    WrongType,
    InvalidParameter,
    IllegalName,
    IllegalOrderType,
    // Auth
    AuthFailed,
    PermissionDenied,
    TokenNotFound,
    InvalidToken,
    TokenMismatchUser,
    // Resource
    NotFound,
    UserNotFound,
    OrderNotFound,
    ProductionNotFound,
    DeskNotFound,
    ThirdAccountNotFound,
    // Game rules
    IllegalDeskStatus,
    PlayerNotFound,
    NoSuchWinPoints,
    DismatchTileNum,
    NotWon,
    CoinNotEnough,
    DeskFull,
    // Payment
    TradeExisted,
    RequestPrePayIdFailed,
    PayTestDisable,
    InvalidPayPlatform,
    // Infra
    DBOperation,
    CacheOperation,
    RequestFailed,
    ServerInternal,
    NotImplemented,
}

use ErrorCode::*;

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            BadRoute => 1001,
            WrongType => 1002,
            InvalidParameter => 1003,
            IllegalName => 1004,
            IllegalOrderType => 1005,
            AuthFailed => 2001,
            PermissionDenied => 2002,
            TokenNotFound => 2003,
            InvalidToken => 2004,
            TokenMismatchUser => 2005,
            NotFound => 3001,
            UserNotFound => 3002,
            OrderNotFound => 3003,
            ProductionNotFound => 3004,
            DeskNotFound => 3005,
            ThirdAccountNotFound => 3006,
            IllegalDeskStatus => 4001,
            PlayerNotFound => 4002,
            NoSuchWinPoints => 4003,
            DismatchTileNum => 4004,
            NotWon => 4005,
            CoinNotEnough => 4006,
            DeskFull => 4007,
            TradeExisted => 5001,
            RequestPrePayIdFailed => 5002,
            PayTestDisable => 5003,
            InvalidPayPlatform => 5004,
            DBOperation => 6001,
            CacheOperation => 6002,
            RequestFailed => 6003,
            ServerInternal => 6004,
            NotImplemented => 6005,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            BadRoute => "bad route",
            WrongType => "wrong type",
            InvalidParameter => "invalid parameter",
            IllegalName => "illegal name",
            IllegalOrderType => "illegal order type",
            AuthFailed => "authorization failed",
            PermissionDenied => "permission denied",
            TokenNotFound => "token not found",
            InvalidToken => "invalid token",
            TokenMismatchUser => "token mismatch user",
            NotFound => "not found",
            UserNotFound => "user not found",
            OrderNotFound => "order not found",
            ProductionNotFound => "production not found",
            DeskNotFound => "desk not found",
            ThirdAccountNotFound => "third account not found",
            IllegalDeskStatus => "illegal desk status",
            PlayerNotFound => "player not found",
            NoSuchWinPoints => "no such win points",
            DismatchTileNum => "tile count mismatch",
            NotWon => "hand is not a winning hand",
            CoinNotEnough => "coin not enough",
            DeskFull => "desk is full",
            TradeExisted => "trade existed",
            RequestPrePayIdFailed => "request prepay id failed",
            PayTestDisable => "pay test disabled",
            InvalidPayPlatform => "invalid pay platform",
            DBOperation => "database operation failed",
            CacheOperation => "cache operation failed",
            RequestFailed => "request failed",
            ServerInternal => "server internal error",
            NotImplemented => "not implemented",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.message(), self.code())
    }
}

impl std::error::Error for ErrorCode {}

impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.code())
    }
}

pub type GameResult<T = ()> = Result<T, ErrorCode>;

#[test]
fn test_codes_unique() {
    let all = [
        BadRoute, WrongType, InvalidParameter, IllegalName, IllegalOrderType, AuthFailed,
        PermissionDenied, TokenNotFound, InvalidToken, TokenMismatchUser, NotFound, UserNotFound,
        OrderNotFound, ProductionNotFound, DeskNotFound, ThirdAccountNotFound, IllegalDeskStatus,
        PlayerNotFound, NoSuchWinPoints, DismatchTileNum, NotWon, CoinNotEnough, DeskFull,
        TradeExisted, RequestPrePayIdFailed, PayTestDisable, InvalidPayPlatform, DBOperation,
        CacheOperation, RequestFailed, ServerInternal, NotImplemented,
    ];
    let mut codes: Vec<i32> = all.iter().map(|e| e.code()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), all.len());
    assert_eq!(serde_json::to_string(&DeskNotFound).unwrap(), "3005");
}
