//! The standard RNS module suite and its wiring.

use rns_core::{namehash, Arg, ModuleDefinition, B256, TLD, U256};

use crate::artifacts::ArtifactSource;
use crate::error::Result;
use crate::wiring::WiringStep;

pub const RNS: &str = "RNS";
pub const PUBLIC_RESOLVER: &str = "PublicResolver";
pub const MULTI_CHAIN_RESOLVER: &str = "MultiChainResolver";
pub const NAME_RESOLVER: &str = "NameResolver";
pub const REVERSE_REGISTRAR: &str = "ReverseRegistrar";
pub const REVERSE_SETUP: &str = "ReverseSetup";
pub const RIF_TOKEN: &str = "ERC677";
pub const TOKEN_REGISTRAR: &str = "TokenRegistrar";
pub const RSK_OWNER: &str = "RSKOwner";
pub const NAME_PRICE: &str = "NamePrice";
pub const BYTES_UTILS: &str = "BytesUtils";
pub const FIFS_REGISTRAR: &str = "FIFSRegistrar";
pub const FIFS_ADDR_REGISTRAR: &str = "FIFSAddrRegistrar";
pub const RENEWER: &str = "Renewer";

/// Every module of the suite, in deployment order.
pub const SUITE: [&str; 14] = [
    RNS,
    PUBLIC_RESOLVER,
    MULTI_CHAIN_RESOLVER,
    NAME_RESOLVER,
    REVERSE_REGISTRAR,
    REVERSE_SETUP,
    RIF_TOKEN,
    TOKEN_REGISTRAR,
    RSK_OWNER,
    NAME_PRICE,
    BYTES_UTILS,
    FIFS_REGISTRAR,
    FIFS_ADDR_REGISTRAR,
    RENEWER,
];

/// Initial token supply minted to the sender: 1000 tokens of 18 decimals.
pub const TOKEN_SUPPLY: u128 = 1_000_000_000_000_000_000_000;
pub const TOKEN_DECIMALS: u64 = 18;

fn tld_node() -> Arg {
    Arg::Bytes32(namehash(TLD))
}

/// Constructor arguments of a suite module.
pub fn constructor_for(module: &str) -> Vec<Arg> {
    match module {
        PUBLIC_RESOLVER | NAME_RESOLVER | REVERSE_REGISTRAR => vec![Arg::module(RNS)],
        MULTI_CHAIN_RESOLVER => vec![Arg::module(RNS), Arg::module(PUBLIC_RESOLVER)],
        REVERSE_SETUP => vec![
            Arg::module(RNS),
            Arg::module(NAME_RESOLVER),
            Arg::module(REVERSE_REGISTRAR),
            Arg::Sender,
        ],
        RIF_TOKEN => vec![
            Arg::Sender,
            Arg::Uint(U256::from(TOKEN_SUPPLY)),
            Arg::string("RIF"),
            Arg::string("RIF"),
            Arg::uint(TOKEN_DECIMALS),
        ],
        TOKEN_REGISTRAR => vec![Arg::module(RNS), tld_node(), Arg::module(RIF_TOKEN)],
        RSK_OWNER => vec![Arg::module(TOKEN_REGISTRAR), Arg::module(RNS), tld_node()],
        FIFS_REGISTRAR | RENEWER => vec![
            Arg::module(RIF_TOKEN),
            Arg::module(RSK_OWNER),
            Arg::Sender,
            Arg::module(NAME_PRICE),
        ],
        FIFS_ADDR_REGISTRAR => vec![
            Arg::module(RIF_TOKEN),
            Arg::module(RSK_OWNER),
            Arg::Sender,
            Arg::module(NAME_PRICE),
            Arg::module(RNS),
            tld_node(),
        ],
        _ => Vec::new(),
    }
}

/// Load every suite artifact and attach its constructor arguments.
pub async fn load_suite(source: &dyn ArtifactSource) -> Result<Vec<ModuleDefinition>> {
    let mut definitions = Vec::with_capacity(SUITE.len());
    for name in SUITE {
        let definition = source.load(name).await?;
        definitions.push(definition.with_constructor(constructor_for(name)));
    }
    Ok(definitions)
}

/// Wiring that runs before the auction: default resolver, reverse suite,
/// and the TLD handed to the auction registrar.
pub fn core_wiring() -> Vec<WiringStep> {
    vec![
        WiringStep::set_default_resolver(RNS, PUBLIC_RESOLVER),
        WiringStep::set_subnode_owner(RNS, B256::ZERO, "reverse", REVERSE_SETUP),
        WiringStep::run(REVERSE_SETUP),
        WiringStep::set_subnode_owner(RNS, B256::ZERO, TLD, TOKEN_REGISTRAR),
    ]
}

/// Wiring that runs after the auction: FIFS registrars and renewer added to
/// the TLD owner, which then takes over the TLD.
pub fn handover_wiring() -> Vec<WiringStep> {
    vec![
        WiringStep::add_registrar(RSK_OWNER, FIFS_REGISTRAR),
        WiringStep::add_registrar(RSK_OWNER, FIFS_ADDR_REGISTRAR),
        WiringStep::add_renewer(RSK_OWNER, RENEWER),
        WiringStep::set_subnode_owner(RNS, B256::ZERO, TLD, RSK_OWNER),
    ]
}

/// Human readable title used in the summary table.
pub fn display_name(module: &str) -> &str {
    match module {
        RNS => "RNS registry",
        PUBLIC_RESOLVER => "Public resolver",
        MULTI_CHAIN_RESOLVER => "Multi-chain resolver",
        NAME_RESOLVER => "Name resolver",
        REVERSE_REGISTRAR => "Reverse registrar",
        REVERSE_SETUP => "Reverse setup",
        RIF_TOKEN => "RIF token",
        TOKEN_REGISTRAR => "Auction registrar (legacy)",
        RSK_OWNER => "RSK owner",
        NAME_PRICE => "Name price",
        BYTES_UTILS => "Bytes utils",
        FIFS_REGISTRAR => "FIFS registrar",
        FIFS_ADDR_REGISTRAR => "FIFS addr registrar",
        RENEWER => "Renewer",
        other => other,
    }
}
