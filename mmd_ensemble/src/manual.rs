/*!

This is the long-form manual for `mmd_ensemble` and `mmdsim`.

## Workflow

A study goes through three steps, each one a sub-command of `mmdsim`:

1. `mmdsim seed`: group the single-member districts (SMDs) of a state into
   multi-member districts (MMDs) of 3 to 5 seats. The result is the seed map.
2. `mmdsim ensemble`: run independent recombination chains from the seed map
   and save the final map of each chain.
3. `mmdsim elections`: run one ranked-choice election in every district of
   every map of the ensemble and save the seats won by each party.

A fourth sub-command, `mmdsim tabulate`, runs a single election from a file
of ballots. It is useful to check the tabulator against published results.

All the sub-commands accept `--verbose` to turn on debug logging. The
`RUST_LOG` environment variable is honored as well.

## Run configuration

`seed`, `ensemble` and `elections` read the same JSON run file (all keys are
camelCase):

```json
{
  "graph": {
    "filePath": "nc_precincts.json",
    "populationColumn": "TOTPOP",
    "demColumn": "EL16G_PR_D",
    "repColumn": "EL16G_PR_R",
    "districtColumn": "CD"
  },
  "seed": {
    "strategy": "hr3863",
    "filePath": "seed_hr3863.json"
  },
  "ensemble": {
    "nMaps": 100,
    "nSteps": 100,
    "epsilon": 0.01,
    "randomSeed": 1,
    "constraints": ["contiguity", "population"]
  },
  "elections": {
    "votingModel": "partyLine",
    "tabulator": "stv"
  },
  "outputDirectory": "out"
}
```

Relative paths are resolved against the directory of the run file.

### `graph`

The precinct graph, in the adjacency format written by
`networkx.readwrite.json_graph.adjacency_data` (and by
`gerrychain.Graph.to_json`):

```json
{
  "nodes": [{"id": 0, "TOTPOP": 1200, "EL16G_PR_D": 300, "EL16G_PR_R": 250, "CD": 1}, ...],
  "adjacency": [[{"id": 1}, {"id": 4}], ...]
}
```

The `adjacency` list is parallel to `nodes`. Column values may be numbers or
strings holding numbers. Fractional populations are rounded.

- `filePath` (string): the graph file.
- `idColumn` (string, optional): the column holding the precinct id. By
  default the node `id` is used.
- `populationColumn`, `demColumn`, `repColumn` (strings): population and
  votes of each party.
- `districtColumn` (string, optional): the single-member district of each
  precinct. Only `seed` needs it.

### `seed`

- `strategy` (`hr3863`, `maxDistricts` or `minDistricts`, default `hr3863`):
  how the number of seats of each district is chosen. `hr3863` follows the
  Fair Representation Act: as many 5-seat districts as possible, then as few
  4-seat districts as possible.
- `filePath` (string): where `seed` writes the seed map and where
  `ensemble` reads it.
- `treeAttempts`, `cutAttempts` (numbers, optional): search budget for
  grouping the single-member districts.
- `randomSeed` (number, optional, default 0).

### `ensemble`

- `nMaps`, `nSteps` (numbers): number of maps, and of recombination steps
  per map.
- `epsilon` (number in [0, 1)): population tolerance of each district,
  relative to its seat-weighted ideal population.
- `constraints` (list, default empty): any of `contiguity`, `population`
  (the `epsilon` bound) and `compactness` (at most `compactnessFactor`
  times the cut edges of the seed map, default 2).
- `seedType` (string, optional): the label of the seed map in the ensemble
  name. Defaults to the seed strategy.
- `randomSeed`, `treeAttempts`, `mapAttempts`, `maxRejections` (numbers,
  optional).
- `failurePolicy` (`abort` or `skip`, default `abort`): what happens when
  one map cannot be generated.

The ensemble is written to
`{seedType}-{nMaps}-{constraints}-{nSteps}-{epsilon}.json` in the output
directory.

### `elections`

- `votingModel`: `partyLine` (every voter ranks the candidates of their
  party first, in a random order, then the other party's) or `partyOrder`
  (the same, with candidates in id order).
- `tabulator`: `stv` or `plurality`.
- `tiebreakMode` (`lowestCandidateId` or `random`, default
  `lowestCandidateId`) and `tiebreakSeed` for the random tie-break. Both
  tabulators use it: STV to pick the eliminated candidate among the lowest
  tallies, plurality to order equal tallies.
- `randomSeed` (number, default 0): map `i` draws its ballots from a random
  source seeded with `randomSeed + i`.

Each district runs as many candidates per party as it has seats. The results
are written to `{ensemble}-{votingModel}-{tabulator}.json` in the output
directory.

Without `--ensemble`, `elections` reads the ensemble of the `ensemble`
section from the output directory. When that run saved fewer maps than
`nMaps` (after `--time-limit` or with `failurePolicy: skip`), the largest
ensemble saved with the same parameters is used.

## Command line

```text
mmdsim seed --config run.json [--out seed.json]
mmdsim ensemble --config run.json [--seed seed.json] [--out dir] [--time-limit 3600]
mmdsim elections --config run.json [--ensemble ensemble.json] [--out dir]
mmdsim tabulate --input ballots.json [--reference summary.json] [--out summary.json]
```

With `--time-limit` (seconds), the generation stops when the limit is reached
and the maps completed so far are written.

## Ballot files

`tabulate` reads a JSON file:

```json
{
  "seats": 2,
  "candidates": [
    {"name": "X", "party": "democrat"},
    {"name": "Y", "party": "republican"},
    {"name": "Z", "party": "democrat"}
  ],
  "ballots": [
    {"choices": ["X", "Y", "Z"], "count": 5},
    {"choices": ["Y", "X", "Z"], "count": 4}
  ],
  "tiebreakMode": "lowestCandidateId"
}
```

`count` is optional (default 1). Blank choices are skipped. The optional
`tiebreakMode` and `randomSeed` keys select the tie-break as above.

The summary printed (or written with `--out`) lists every round: the tally of
each continuing candidate, then the elected candidates and the eliminated
candidate with the weight they transferred to the others. Weights are
printed as strings to keep them exact. With `--reference`, the summary is
compared to the given file, the differences are printed and the program
fails if there are any.

## Tabulation rules

The tabulator implements the single transferable vote with fractional
surplus transfers:

- the threshold is `ballots / (seats + 1)`, and a candidate must exceed it
  strictly to be elected;
- all the candidates above the threshold in a round are elected together,
  and the surplus of each (`(tally - threshold) / tally` of every ballot
  counting for it) moves to the next continuing choice;
- when no candidate is elected, the candidate with the lowest tally is
  eliminated and its ballots move at full weight. Ties go to the lowest
  candidate id, or with the `random` mode to the order of the SHA-256
  digests of the seed, the round number and the candidate names;
- when the continuing candidates can just fill the remaining seats, they
  are all elected.

 */
