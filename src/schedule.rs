//! Dependency-ordered scheduling of per-module work
//!
//! A module becomes ready as soon as all of its imports are done, so work flows through the
//! graph as a frontier rather than level by level. The calling thread coordinates: it owns
//! the remaining-import counts and receives results from the workers over a channel.

use crate::engine::StructuralError;
use crate::graph::ImportGraph;
use crate::syntax::ModuleName;
use log::debug;
use rayon::ThreadPool;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

/// Run `visit` once per module, after the results of all its imports are available
///
/// `visit` receives the results of the module's direct imports ordered by module name.
/// Without a pool the modules are visited on the calling thread in topological order. With
/// a pool the calling thread must not be one of the pool's workers. A panic in `visit` is
/// resumed on the calling thread once in-flight work has finished.
pub fn fold_in_dependency_order<T, F>(
    graph: &ImportGraph,
    pool: Option<&ThreadPool>,
    visit: F,
) -> Result<BTreeMap<ModuleName, Arc<T>>, StructuralError>
where
    T: Send + Sync,
    F: Fn(&ModuleName, Vec<Arc<T>>) -> Arc<T> + Sync,
{
    match pool {
        Some(pool) => fold_parallel(graph, pool, &visit),
        None => fold_sequential(graph, &visit),
    }
}

fn upstream_of<T>(
    graph: &ImportGraph,
    name: &ModuleName,
    done: &BTreeMap<ModuleName, Arc<T>>,
) -> Vec<Arc<T>> {
    graph
        .imports_of(name)
        .filter_map(|import| done.get(import).cloned())
        .collect()
}

fn fold_sequential<T, F>(
    graph: &ImportGraph,
    visit: &F,
) -> Result<BTreeMap<ModuleName, Arc<T>>, StructuralError>
where
    F: Fn(&ModuleName, Vec<Arc<T>>) -> Arc<T>,
{
    let mut done = BTreeMap::new();
    for name in graph.topological_order()? {
        let upstream = upstream_of(graph, &name, &done);
        let value = visit(&name, upstream);
        done.insert(name, value);
    }
    Ok(done)
}

fn fold_parallel<T, F>(
    graph: &ImportGraph,
    pool: &ThreadPool,
    visit: &F,
) -> Result<BTreeMap<ModuleName, Arc<T>>, StructuralError>
where
    T: Send + Sync,
    F: Fn(&ModuleName, Vec<Arc<T>>) -> Arc<T> + Sync,
{
    let mut remaining: BTreeMap<&ModuleName, usize> = graph
        .modules()
        .map(|name| (name, graph.imports_of(name).count()))
        .collect();
    let mut ready: Vec<&ModuleName> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut done: BTreeMap<ModuleName, Arc<T>> = BTreeMap::new();
    let mut failure = None;

    let (sender, receiver) = mpsc::channel::<(&ModuleName, thread::Result<Arc<T>>)>();

    pool.in_place_scope(|scope| {
        let mut in_flight = 0usize;
        loop {
            for name in ready.drain(..) {
                let upstream = upstream_of(graph, name, &done);
                let sender = sender.clone();
                debug!("Scheduling {} ({} imports done)", name, upstream.len());
                scope.spawn(move |_| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| visit(name, upstream)));
                    // the receiver outlives the scope
                    let _ = sender.send((name, outcome));
                });
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }
            let Ok((name, outcome)) = receiver.recv() else {
                break;
            };
            in_flight -= 1;

            match outcome {
                Ok(value) => {
                    done.insert(name.clone(), value);
                    if failure.is_some() {
                        continue;
                    }
                    for importer in graph.importers_of(name) {
                        if let Some(count) = remaining.get_mut(importer) {
                            *count -= 1;
                            if *count == 0 {
                                ready.push(importer);
                            }
                        }
                    }
                }
                Err(payload) => {
                    ready.clear();
                    failure.get_or_insert(payload);
                }
            }
        }
    });

    if let Some(payload) = failure {
        panic::resume_unwind(payload);
    }
    if done.len() < graph.len() {
        return Err(StructuralError::Cycle(graph.find_cycle().unwrap_or_default()));
    }
    Ok(done)
}
