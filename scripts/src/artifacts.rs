//! Loading of compiled contract artifacts and ABI encoding of manifest arguments

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{JsonAbi, Param},
};
use alloy_primitives::Bytes;
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::{constants::MANIFEST_EXTENSION, errors::ScriptError};

/// Strip the source path from a fully qualified `path/File.sol:Name` contract name
pub fn artifact_name(contract: &str) -> &str {
    contract.rsplit_once(':').map_or(contract, |(_, name)| name)
}

/// The creation bytecode of an artifact, in either the hardhat or the foundry layout
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ArtifactBytecode {
    /// Hardhat: `"bytecode": "0x..."`
    Hex(Bytes),
    /// Foundry: `"bytecode": { "object": "0x..." }`
    Object {
        /// The hex-encoded bytecode
        object: Bytes,
    },
}

/// A compiled contract: its ABI and creation bytecode
#[derive(Clone, Debug, Deserialize)]
pub struct Artifact {
    /// The contract ABI
    pub abi: JsonAbi,
    /// The creation bytecode
    bytecode: ArtifactBytecode,
}

impl Artifact {
    /// The creation bytecode, without constructor arguments
    pub fn bytecode(&self) -> &Bytes {
        match &self.bytecode {
            ArtifactBytecode::Hex(b) => b,
            ArtifactBytecode::Object { object } => object,
        }
    }

    /// Whether the ABI declares a function named `name`
    pub fn has_function(&self, name: &str) -> bool {
        self.abi.function(name).is_some_and(|f| !f.is_empty())
    }

    /// ABI-encode manifest arguments for the constructor
    pub fn encode_constructor_args(&self, args: &[Value]) -> Result<Vec<u8>, ScriptError> {
        match self.abi.constructor() {
            Some(ctor) => {
                let values = coerce_args(&ctor.inputs, args)?;
                self.encode_constructor_values(&values)
            }
            None if args.is_empty() => Ok(Vec::new()),
            None => Err(ScriptError::CalldataConstruction(format!(
                "contract has no constructor but {} arguments were given",
                args.len()
            ))),
        }
    }

    /// ABI-encode already typed constructor arguments
    pub fn encode_constructor_values(&self, values: &[DynSolValue]) -> Result<Vec<u8>, ScriptError> {
        match self.abi.constructor() {
            Some(ctor) => ctor
                .abi_encode_input(values)
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string())),
            None if values.is_empty() => Ok(Vec::new()),
            None => Err(ScriptError::CalldataConstruction(
                "contract has no constructor".to_string(),
            )),
        }
    }

    /// The bytecode followed by the encoded constructor arguments
    pub fn deploy_code(&self, args: &[Value]) -> Result<Bytes, ScriptError> {
        let encoded = self.encode_constructor_args(args)?;
        Ok(self.with_constructor_data(encoded))
    }

    /// The bytecode followed by already encoded constructor arguments
    pub fn with_constructor_data(&self, encoded: Vec<u8>) -> Bytes {
        let mut code = self.bytecode().to_vec();
        code.extend(encoded);
        code.into()
    }

    /// ABI-encode a call to `function`, selector included.
    ///
    /// Overloads are disambiguated by argument count, the first match winning.
    pub fn encode_call(&self, function: &str, args: &[Value]) -> Result<Vec<u8>, ScriptError> {
        let func = self
            .abi
            .function(function)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
            .ok_or_else(|| {
                ScriptError::CalldataConstruction(format!(
                    "no function `{}` taking {} arguments",
                    function,
                    args.len()
                ))
            })?;

        let values = coerce_args(&func.inputs, args)?;
        func.abi_encode_input(&values).map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
    }
}

/// Coerce manifest JSON arguments into values of the given ABI parameters
pub fn coerce_args(params: &[Param], args: &[Value]) -> Result<Vec<DynSolValue>, ScriptError> {
    if params.len() != args.len() {
        return Err(ScriptError::CalldataConstruction(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
            coerce_value(&ty, arg)
        })
        .collect()
}

/// Coerce a single JSON value into a value of type `ty`.
///
/// Lists map onto arrays and tuples element-wise, scalars are parsed from
/// their string form.
pub fn coerce_value(ty: &DynSolType, value: &Value) -> Result<DynSolValue, ScriptError> {
    let coerced = match (ty, value) {
        (DynSolType::Array(inner), Value::Array(items)) => DynSolValue::Array(
            items.iter().map(|v| coerce_value(inner, v)).collect::<Result<_, _>>()?,
        ),
        (DynSolType::FixedArray(inner, len), Value::Array(items)) if items.len() == *len => {
            DynSolValue::FixedArray(
                items.iter().map(|v| coerce_value(inner, v)).collect::<Result<_, _>>()?,
            )
        }
        (DynSolType::Tuple(types), Value::Array(items)) if types.len() == items.len() => {
            DynSolValue::Tuple(
                types
                    .iter()
                    .zip(items)
                    .map(|(t, v)| coerce_value(t, v))
                    .collect::<Result<_, _>>()?,
            )
        }
        (_, Value::String(s)) => coerce_scalar(ty, s)?,
        (_, Value::Number(n)) => coerce_scalar(ty, &n.to_string())?,
        (_, Value::Bool(b)) => coerce_scalar(ty, &b.to_string())?,
        _ => {
            return Err(ScriptError::CalldataConstruction(format!(
                "cannot encode {} as {}",
                value,
                ty.sol_type_name()
            )))
        }
    };
    Ok(coerced)
}

/// Parse a scalar from its string form
fn coerce_scalar(ty: &DynSolType, s: &str) -> Result<DynSolValue, ScriptError> {
    ty.coerce_str(s).map_err(|e| {
        ScriptError::CalldataConstruction(format!("`{}` as {}: {}", s, ty.sol_type_name(), e))
    })
}

/// A directory of compiled artifacts, searched recursively by contract name
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    /// The root of the artifacts tree
    root: PathBuf,
}

impl ArtifactStore {
    /// An artifact store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load the artifact of `contract`, which may be fully qualified
    pub fn load(&self, contract: &str) -> Result<Artifact, ScriptError> {
        let name = artifact_name(contract);
        let path = find_artifact(&self.root, name)?.ok_or_else(|| {
            ScriptError::ArtifactParsing(format!(
                "no artifact for `{}` under {}",
                name,
                self.root.display()
            ))
        })?;
        trace!("Loading artifact {}", path.display());

        let contents =
            fs::read_to_string(&path).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;
        serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))
    }
}

/// Depth-first search for `<name>.json` below `dir`
fn find_artifact(dir: &Path, name: &str) -> Result<Option<PathBuf>, ScriptError> {
    let file_name = format!("{}.{}", name, MANIFEST_EXTENSION);
    let mut subdirs = Vec::new();

    let entries = fs::read_dir(dir).map_err(|e| {
        ScriptError::ArtifactParsing(format!("reading {}: {}", dir.display(), e))
    })?;
    for entry in entries {
        let path = entry.map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path.file_name().is_some_and(|f| f == file_name.as_str()) {
            return Ok(Some(path));
        }
    }

    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_artifact(&subdir, name)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};
    use serde_json::json;

    use super::*;

    /// A minimal artifact with a `(address,uint256[])` constructor and two
    /// overloads of `addPool`
    fn pool_artifact() -> Artifact {
        serde_json::from_value(json!({
            "contractName": "GamePool",
            "abi": [
                {
                    "type": "constructor",
                    "stateMutability": "nonpayable",
                    "inputs": [
                        { "name": "token", "type": "address", "internalType": "address" },
                        { "name": "weights", "type": "uint256[]", "internalType": "uint256[]" }
                    ]
                },
                {
                    "type": "function",
                    "name": "addPool",
                    "stateMutability": "nonpayable",
                    "inputs": [{ "name": "token", "type": "address", "internalType": "address" }],
                    "outputs": []
                },
                {
                    "type": "function",
                    "name": "addPool",
                    "stateMutability": "nonpayable",
                    "inputs": [
                        { "name": "token", "type": "address", "internalType": "address" },
                        { "name": "enabled", "type": "bool", "internalType": "bool" }
                    ],
                    "outputs": []
                }
            ],
            "bytecode": "0x6080"
        }))
        .unwrap()
    }

    #[test]
    fn test_artifact_name_strips_source_path() {
        assert_eq!(artifact_name("contracts/Farm.sol:GameFarm"), "GameFarm");
        assert_eq!(artifact_name("GameFarm"), "GameFarm");
    }

    #[test]
    fn test_foundry_bytecode_layout() {
        let artifact: Artifact =
            serde_json::from_value(json!({ "abi": [], "bytecode": { "object": "0x60aa" } }))
                .unwrap();
        assert_eq!(artifact.bytecode().to_vec(), vec![0x60, 0xaa]);
        assert!(artifact.deploy_code(&[]).is_ok());
        assert!(artifact.deploy_code(&[json!(1)]).is_err());
    }

    #[test]
    fn test_constructor_args_appended_to_bytecode() {
        let artifact = pool_artifact();
        let token = Address::with_last_byte(0x11);
        let code = artifact
            .deploy_code(&[json!(token.to_string()), json!([1, "2"])])
            .unwrap();

        assert_eq!(&code[..2], &[0x60, 0x80]);
        // head (2 words) + array length + 2 elements
        assert_eq!(code.len(), 2 + 32 * 5);
        assert_eq!(&code[2 + 12..2 + 32], token.as_slice());
    }

    #[test]
    fn test_encode_call_selects_overload_by_arity() {
        let artifact = pool_artifact();
        let token = Address::with_last_byte(0x22).to_string();

        let one = artifact.encode_call("addPool", &[json!(token)]).unwrap();
        let two = artifact.encode_call("addPool", &[json!(token), json!(true)]).unwrap();
        assert_eq!(one.len(), 4 + 32);
        assert_eq!(two.len(), 4 + 64);
        assert_ne!(one[..4], two[..4]);

        assert!(artifact.encode_call("addPool", &[]).is_err());
        assert!(artifact.encode_call("removePool", &[json!(token)]).is_err());
    }

    #[test]
    fn test_coerce_nested_values() {
        let ty = DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Array(Box::new(DynSolType::Uint(256))),
        ]);
        let addr = Address::with_last_byte(1);
        let value = coerce_value(&ty, &json!([addr.to_string(), [5, "6"]])).unwrap();

        assert_eq!(
            value,
            DynSolValue::Tuple(vec![
                DynSolValue::Address(addr),
                DynSolValue::Array(vec![
                    DynSolValue::Uint(U256::from(5), 256),
                    DynSolValue::Uint(U256::from(6), 256),
                ]),
            ])
        );
    }

    #[test]
    fn test_unresolved_placeholder_is_rejected() {
        let err = coerce_value(&DynSolType::Address, &json!("${Token.address}")).unwrap_err();
        assert!(matches!(err, ScriptError::CalldataConstruction(_)));
    }
}
