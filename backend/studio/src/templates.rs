//! Starter contracts: the seed projects given to every new account, the
//! template catalogue, and validation of user-chosen project metadata.

use serde::Serialize;

use crate::errors::{Result, StudioError};
use crate::models::NewProject;

pub const HELLO_WORLD_CODE: &str = include_str!("../templates/hello_world.rs");
pub const COUNTER_CODE: &str = include_str!("../templates/counter.rs");
const ERC20_CODE: &str = include_str!("../templates/erc20.rs");
const ERC721_CODE: &str = include_str!("../templates/erc721.rs");
const ERC1155_CODE: &str = include_str!("../templates/erc1155.rs");
const ACCESS_CONTROL_CODE: &str = include_str!("../templates/access_control.rs");

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_DESCRIPTION_LEN: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub title: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    pub code: &'static str,
    pub features: &'static [&'static str],
    pub is_open_zeppelin: bool,
    pub documentation: Option<&'static str>,
    pub references: &'static [Reference],
}

/// Projects created once for every new account.
pub fn seed_projects() -> [NewProject; 2] {
    [
        NewProject {
            name: "Hello World".into(),
            description: Some(
                "A simple Hello World smart contract to get started with Stylus".into(),
            ),
            code: HELLO_WORLD_CODE.into(),
        },
        NewProject {
            name: "Counter".into(),
            description: Some(
                "A basic counter smart contract demonstrating state management".into(),
            ),
            code: COUNTER_CODE.into(),
        },
    ]
}

pub static TEMPLATES: &[Template] = &[
    Template {
        name: "Hello World",
        description: "The smallest Stylus contract: one storage slot and a greeting.",
        code: HELLO_WORLD_CODE,
        features: &[
            "Minimal contract layout",
            "Returning strings from a view method",
        ],
        is_open_zeppelin: false,
        documentation: None,
        references: &[],
    },
    Template {
        name: "Counter Contract",
        description: "A foundational smart contract demonstrating state management and basic interactions. Perfect starting point for learning Stylus development with a simple yet practical example.",
        code: COUNTER_CODE,
        features: &[
            "Learn basic contract structure",
            "Understand state variables",
            "Implement safe arithmetic",
            "Handle error conditions",
        ],
        is_open_zeppelin: false,
        documentation: None,
        references: &[],
    },
    Template {
        name: "ERC-20 Token",
        description: "Create your own fungible token with the ERC-20 standard. Includes complete implementation with transfer mechanics, allowances, and OpenZeppelin's battle-tested security features.",
        code: ERC20_CODE,
        features: &[
            "Create fungible tokens with custom name and symbol",
            "Implement secure transfer and approval mechanics",
            "Manage token supply and decimals",
            "Handle allowances for DeFi integrations",
        ],
        is_open_zeppelin: true,
        documentation: Some("https://docs.openzeppelin.com/contracts/4.x/erc20"),
        references: &[
            Reference {
                title: "ERC-20 Standard",
                url: "https://eips.ethereum.org/EIPS/eip-20",
            },
            Reference {
                title: "OpenZeppelin Implementation",
                url: "https://github.com/OpenZeppelin/openzeppelin-contracts/blob/master/contracts/token/ERC20/ERC20.sol",
            },
        ],
    },
    Template {
        name: "ERC-721 NFT",
        description: "Build a complete NFT collection with the ERC-721 standard. Features minting, transfers, metadata management, and OpenZeppelin's proven security patterns for non-fungible tokens.",
        code: ERC721_CODE,
        features: &[
            "Implement NFT minting and transfers",
            "Handle token ownership and approvals",
            "Manage token metadata",
            "Support token enumeration",
        ],
        is_open_zeppelin: true,
        documentation: Some("https://docs.openzeppelin.com/contracts/4.x/erc721"),
        references: &[Reference {
            title: "ERC-721 Standard",
            url: "https://eips.ethereum.org/EIPS/eip-721",
        }],
    },
    Template {
        name: "ERC-1155 Multi-Token",
        description: "Implement a versatile multi-token standard supporting both fungible and non-fungible tokens. Perfect for gaming assets, mixed collections, and advanced token economics.",
        code: ERC1155_CODE,
        features: &[
            "Handle multiple token types",
            "Implement batch transfers",
            "Manage token balances",
            "Support metadata URIs",
        ],
        is_open_zeppelin: true,
        documentation: Some("https://docs.openzeppelin.com/contracts/4.x/erc1155"),
        references: &[Reference {
            title: "ERC-1155 Standard",
            url: "https://eips.ethereum.org/EIPS/eip-1155",
        }],
    },
    Template {
        name: "Access Control",
        description: "Implement sophisticated role-based access control for your smart contracts. Features flexible permission systems, role hierarchies, and OpenZeppelin's proven security patterns.",
        code: ACCESS_CONTROL_CODE,
        features: &[
            "Define role hierarchies",
            "Manage role assignments",
            "Implement permission checks",
            "Handle admin capabilities",
        ],
        is_open_zeppelin: true,
        documentation: Some("https://docs.openzeppelin.com/contracts/4.x/access-control"),
        references: &[],
    },
];

pub fn find_template(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.name == name)
}

/// Project names are lowercase letters, digits and hyphens, 1 to 50 chars.
pub fn validate_project_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StudioError::Validation("Project name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(StudioError::Validation(format!(
            "Project name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(StudioError::Validation(
            "Only lowercase letters, numbers, and hyphens are allowed".into(),
        ));
    }
    Ok(())
}

pub fn validate_description(description: Option<&str>) -> Result<()> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(StudioError::Validation(
            format!("Description must be at most {MAX_DESCRIPTION_LEN} characters"),
        )),
        _ => Ok(()),
    }
}
