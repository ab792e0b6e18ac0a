use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Networks a BraidPay payment can settle on
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Ethereum,
    Polygon,
    Base,
    Solana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Stablecoins a BraidPay payment can be made in
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    Usdc,
    Usdt,
    Pyusd,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Ethereum => write!(f, "ETHEREUM"),
            Network::Polygon => write!(f, "POLYGON"),
            Network::Base => write!(f, "BASE"),
            Network::Solana => write!(f, "SOLANA"),
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Usdc => write!(f, "USDC"),
            Token::Usdt => write!(f, "USDT"),
            Token::Pyusd => write!(f, "PYUSD"),
        }
    }
}
