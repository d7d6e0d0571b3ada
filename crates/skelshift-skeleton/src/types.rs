//! Immutable bone hierarchy.
//!
//! Bones live in an index arena. Indices are stable (input order) and are
//! what every other crate uses to address bones; names resolve through
//! [`Skeleton::find_by_name`]. Reference-pose globals are composed once at
//! build time along a topological order, so parents do not need to precede
//! their children in the input.

use std::collections::HashMap;

use skelshift_core::{HierarchyError, Transform};

// ---------------------------------------------------------------------------
// Bone
// ---------------------------------------------------------------------------

/// One node of the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Unique, non-empty name.
    pub name: String,
    /// Position in the arena.
    pub index: usize,
    /// Parent index, `None` for the root.
    pub parent: Option<usize>,
    /// Reference ("bind") pose relative to the parent.
    pub reference_local: Transform,
    /// Reference pose in world space.
    pub reference_global: Transform,
}

// ---------------------------------------------------------------------------
// Skeleton
// ---------------------------------------------------------------------------

/// A validated, single-rooted bone tree.
#[derive(Debug, Clone)]
pub struct Skeleton {
    bones: Vec<Bone>,
    children: Vec<Vec<usize>>,
    by_name: HashMap<String, usize>,
    order: Vec<usize>,
    root: usize,
}

impl Skeleton {
    /// Validate the inputs and build the skeleton.
    ///
    /// The three vectors are parallel: `parents[i]` and `reference_local[i]`
    /// describe `names[i]`.
    pub fn build(
        names: Vec<String>,
        parents: Vec<Option<usize>>,
        reference_local: Vec<Transform>,
    ) -> Result<Self, HierarchyError> {
        let n = names.len();
        if parents.len() != n || reference_local.len() != n {
            return Err(HierarchyError::LengthMismatch {
                names: n,
                parents: parents.len(),
                transforms: reference_local.len(),
            });
        }
        if n == 0 {
            return Err(HierarchyError::Empty);
        }

        let mut by_name = HashMap::with_capacity(n);
        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(HierarchyError::EmptyName { index });
            }
            if by_name.insert(name.clone(), index).is_some() {
                return Err(HierarchyError::DuplicateName(name.clone()));
            }
        }

        let mut root: Option<usize> = None;
        let mut children = vec![Vec::new(); n];
        for (i, parent) in parents.iter().enumerate() {
            match *parent {
                Some(p) if p >= n => {
                    return Err(HierarchyError::ParentOutOfRange {
                        bone: names[i].clone(),
                        parent: p,
                    });
                }
                Some(p) if p == i => return Err(HierarchyError::Cycle(names[i].clone())),
                Some(p) => children[p].push(i),
                None => {
                    if let Some(first) = root {
                        return Err(HierarchyError::MultipleRoots {
                            first: names[first].clone(),
                            second: names[i].clone(),
                        });
                    }
                    root = Some(i);
                }
            }
        }
        // Every bone has a parent, so the parent links must loop somewhere.
        let Some(root) = root else {
            return Err(HierarchyError::Cycle(names[cycle_member(&parents, 0)].clone()));
        };

        let mut order = Vec::with_capacity(n);
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(children[i].iter().rev());
        }
        if order.len() != n {
            let mut visited = vec![false; n];
            for &i in &order {
                visited[i] = true;
            }
            let stray = visited.iter().position(|v| !v).unwrap_or(0);
            return Err(HierarchyError::Cycle(
                names[cycle_member(&parents, stray)].clone(),
            ));
        }

        let mut bones: Vec<Bone> = names
            .into_iter()
            .zip(parents)
            .zip(reference_local)
            .enumerate()
            .map(|(index, ((name, parent), local))| Bone {
                name,
                index,
                parent,
                reference_local: local,
                reference_global: local,
            })
            .collect();
        for &i in &order {
            if let Some(p) = bones[i].parent {
                bones[i].reference_global = bones[p].reference_global.compose(&bones[i].reference_local);
            }
        }

        tracing::debug!(bones = n, root = %bones[root].name, "built skeleton");

        Ok(Self {
            bones,
            children,
            by_name,
            order,
            root,
        })
    }

    /// Number of bones.
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    /// Always false for a built skeleton; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// All bones in index order.
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Bone at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn bone(&self, index: usize) -> &Bone {
        &self.bones[index]
    }

    /// Bone name at `index`.
    pub fn name(&self, index: usize) -> &str {
        &self.bones[index].name
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Index of the single parentless bone.
    pub const fn root(&self) -> usize {
        self.root
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.bones[index].parent
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    /// Topological order: every bone appears after its parent.
    pub fn evaluation_order(&self) -> &[usize] {
        &self.order
    }

    pub fn reference_local_transform(&self, index: usize) -> &Transform {
        &self.bones[index].reference_local
    }

    /// Cached world-space reference transform.
    pub fn global_reference_transform(&self, index: usize) -> &Transform {
        &self.bones[index].reference_global
    }

    /// Whether `ancestor` lies strictly above `bone`.
    pub fn is_ancestor(&self, ancestor: usize, bone: usize) -> bool {
        let mut current = self.parent(bone);
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.parent(i);
        }
        false
    }

    /// Parent-contiguous run from `start` down to `end`, both inclusive.
    ///
    /// Returns `None` when `start` is not `end` or one of its ancestors.
    pub fn path_between(&self, start: usize, end: usize) -> Option<Vec<usize>> {
        let mut path = vec![end];
        let mut current = end;
        while current != start {
            current = self.parent(current)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Number of bones from `index` up to the root, root included.
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = Some(index);
        while let Some(i) = current {
            depth += 1;
            current = self.parent(i);
        }
        depth
    }

    /// World-space distance between two bones in the reference pose.
    pub fn reference_distance(&self, a: usize, b: usize) -> f32 {
        (self.bones[a].reference_global.translation - self.bones[b].reference_global.translation)
            .norm()
    }
}

/// Walk parent links from `start` long enough to land inside a loop.
fn cycle_member(parents: &[Option<usize>], start: usize) -> usize {
    let mut current = start;
    for _ in 0..parents.len() {
        match parents[current] {
            Some(p) if p < parents.len() => current = p,
            _ => break,
        }
    }
    current
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
