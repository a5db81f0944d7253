//! Host-side dependency-order validator (SPEC_FULL.md §2, spec.md §9 Design
//! Notes: "expose a host-side validator that warns when the declared order
//! does not match data dependency"). Never called on the device's own
//! decode path — decode always accepts the blob's order as-is and accepts
//! the resulting one-tick lag. This is meant to be run by host tooling or
//! tests against a decoded graph to flag forward references before they
//! reach a vehicle.

use heapless::Vec;

use crate::channel::ChannelId;
use crate::engine::defs::VirtualChannelDef;
use crate::limits::MAX_VIRTUAL_CHANNELS;

/// A node whose input reference points at a virtual channel defined later
/// in the same blob — i.e. it will read one tick stale on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyWarning {
    pub consumer_output: ChannelId,
    pub forward_reference: ChannelId,
}

/// Walk a decoded graph in definition order and report every forward
/// reference. Never fails; an empty result means the order already matches
/// data dependency.
pub fn validate_dependency_order(
    defs: &[VirtualChannelDef],
) -> Vec<DependencyWarning, MAX_VIRTUAL_CHANNELS> {
    let mut warnings = Vec::new();
    let mut defined: Vec<ChannelId, MAX_VIRTUAL_CHANNELS> = Vec::new();

    for def in defs {
        let output = primary_output(def);
        for reference in references(def) {
            if reference.is_none() {
                continue;
            }
            let is_virtual = reference.0 >= ChannelId::VIRTUAL_BASE;
            let already_defined = defined.iter().any(|id| *id == reference);
            if is_virtual && !already_defined {
                let _ = warnings.push(DependencyWarning {
                    consumer_output: output,
                    forward_reference: reference,
                });
            }
        }
        let _ = defined.push(output);
        if let (_, Some(secondary)) = def.output_ids() {
            let _ = defined.push(secondary);
        }
    }

    warnings
}

fn primary_output(def: &VirtualChannelDef) -> ChannelId {
    def.output_ids().0
}

fn references(def: &VirtualChannelDef) -> Vec<ChannelId, 8> {
    let mut refs = Vec::new();
    match def {
        VirtualChannelDef::Logic(d) => {
            let _ = refs.push(d.input_a);
            let _ = refs.push(d.input_b);
            let _ = refs.push(d.set_ref);
            let _ = refs.push(d.reset_ref);
            let _ = refs.push(d.toggle_ref);
        }
        VirtualChannelDef::Math(d) => {
            for input in d.inputs.iter() {
                let _ = refs.push(*input);
            }
        }
        VirtualChannelDef::Timer(d) => {
            let _ = refs.push(d.start_ref);
            let _ = refs.push(d.stop_ref);
        }
        VirtualChannelDef::Filter(d) => {
            let _ = refs.push(d.input);
        }
        VirtualChannelDef::Switch(d) => {
            let _ = refs.push(d.up_ref);
            let _ = refs.push(d.down_ref);
        }
    }
    refs
}
