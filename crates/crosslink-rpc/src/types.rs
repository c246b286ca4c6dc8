use serde::{Deserialize, Serialize};
use serde_json::Value;

use crosslink_core::encoding::from_prefixed_hex;
use crosslink_core::{
    BlockchainId, CoordinationContract, CrossError, KeyVersion, LinkedNode, PrivacyGroup,
    SubordinateViewReceipt,
};

/// Entry of `cross_listLinkedNodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLinkedNode {
    pub blockchain_id: u64,
    pub ip_address_and_port: String,
}

/// Entry of `cross_listCoordinationContracts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcCoordinationContract {
    pub blockchain_id: u64,
    /// `0x` hex, 20 bytes.
    pub address: String,
    pub ip_address_and_port: String,
}

/// Result of `cross_processSubordinateView`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcSubordinateViewResult {
    /// `0x` hex hash of the accepted view.
    pub view_hash: String,
    /// Key version whose public key verified the view.
    pub key_version: u64,
}

/// Entry of `priv_findPrivacyGroup`. Ids and members are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcPrivacyGroup {
    pub privacy_group_id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub group_type: String,
    pub members: Vec<String>,
}

/// Options object of `priv_createPrivacyGroup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcCreatePrivacyGroupRequest {
    pub addresses: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Result of `debug_traceTransaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTrace {
    pub gas: u64,
    pub failed: bool,
    pub return_value: String,
    /// One entry per executed opcode, kept as the node reports it.
    #[serde(default)]
    pub struct_logs: Vec<Value>,
}

impl From<RpcLinkedNode> for LinkedNode {
    fn from(n: RpcLinkedNode) -> Self {
        LinkedNode {
            blockchain_id: BlockchainId(n.blockchain_id),
            endpoint: n.ip_address_and_port,
        }
    }
}

impl From<&LinkedNode> for RpcLinkedNode {
    fn from(n: &LinkedNode) -> Self {
        RpcLinkedNode {
            blockchain_id: n.blockchain_id.0,
            ip_address_and_port: n.endpoint.clone(),
        }
    }
}

impl TryFrom<RpcCoordinationContract> for CoordinationContract {
    type Error = CrossError;

    fn try_from(c: RpcCoordinationContract) -> Result<Self, Self::Error> {
        Ok(CoordinationContract {
            blockchain_id: BlockchainId(c.blockchain_id),
            address: c.address.parse()?,
            endpoint: c.ip_address_and_port,
        })
    }
}

impl From<&CoordinationContract> for RpcCoordinationContract {
    fn from(c: &CoordinationContract) -> Self {
        RpcCoordinationContract {
            blockchain_id: c.blockchain_id.0,
            address: c.address.to_hex(),
            ip_address_and_port: c.endpoint.clone(),
        }
    }
}

impl TryFrom<RpcSubordinateViewResult> for SubordinateViewReceipt {
    type Error = CrossError;

    fn try_from(r: RpcSubordinateViewResult) -> Result<Self, Self::Error> {
        Ok(SubordinateViewReceipt {
            view_hash: from_prefixed_hex(&r.view_hash, "view hash")?,
            key_version: KeyVersion(r.key_version),
        })
    }
}

impl TryFrom<RpcPrivacyGroup> for PrivacyGroup {
    type Error = CrossError;

    fn try_from(g: RpcPrivacyGroup) -> Result<Self, Self::Error> {
        Ok(PrivacyGroup {
            id: g.privacy_group_id.parse()?,
            name: g.name,
            description: g.description,
            kind: g.group_type,
            members: g.members.iter().map(|m| m.parse()).collect::<Result<_, _>>()?,
        })
    }
}

impl From<&PrivacyGroup> for RpcPrivacyGroup {
    fn from(g: &PrivacyGroup) -> Self {
        RpcPrivacyGroup {
            privacy_group_id: g.id.to_base64(),
            name: g.name.clone(),
            description: g.description.clone(),
            group_type: g.kind.clone(),
            members: g.members.iter().map(|m| m.to_base64()).collect(),
        }
    }
}
