//! Move-mode resolution and the data movement itself

use relay_core::{DataHandle, DataObject, MoveMode, Piece};
use relay_storage::ItemFlags;

/// Move mode for one item
///
/// Always-clone items replicate regardless of the view mode. Redistributable
/// items are rebalanced when the view renders in place and redistribution is
/// enabled. Everything else follows the view mode.
pub fn resolve_move_mode(flags: ItemFlags, view_mode: MoveMode, redistribute: bool) -> MoveMode {
    if flags.always_clone {
        MoveMode::CloneToAll
    } else if redistribute && flags.redistributable && view_mode == MoveMode::PassThrough {
        MoveMode::Redistribute
    } else {
        view_mode
    }
}

/// Compute what `rank` holds after moving `contributions`
///
/// `contributions` is indexed by rank; `None` means the rank had nothing for
/// this item. `local` is this rank's own data and is used by pass-through.
pub fn apply_move(
    mode: MoveMode,
    rank: usize,
    size: usize,
    local: Option<&DataHandle>,
    contributions: &[Option<DataHandle>],
) -> DataHandle {
    match mode {
        MoveMode::PassThrough => local
            .cloned()
            .unwrap_or_else(|| DataObject::empty().into_handle()),
        MoveMode::CollectToRoot if rank != 0 => DataObject::empty().into_handle(),
        MoveMode::CollectToRoot | MoveMode::CloneToAll => {
            DataObject::merge(contributions.iter().flatten().map(|d| d.as_ref())).into_handle()
        }
        MoveMode::Redistribute => {
            let size = size.max(1);
            let pieces: Vec<Piece> = contributions
                .iter()
                .flatten()
                .flat_map(|d| d.pieces().iter())
                .enumerate()
                .filter(|(i, _)| i % size == rank)
                .map(|(_, piece)| piece.clone())
                .collect();
            DataObject::new(pieces).into_handle()
        }
    }
}
